// Client <-> simulator conformance over loopback TCP

use std::sync::Arc;
use std::time::Duration;

use nessclient::event::{ArmingStatus, StatusUpdate};
use nessclient::{
    ArmingMode, ArmingState, Client, ClientConfig, ClientEvent, EventReceiver, LoggingConnection,
    PanelSimulator, SimulatorConfig, SimulatorServer, TcpConnection,
};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

async fn start_simulator(config: SimulatorConfig) -> (PanelSimulator, Client) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let simulator = PanelSimulator::new(config);
    let server = SimulatorServer::bind("127.0.0.1:0", simulator.clone())
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());

    let connection = Arc::new(LoggingConnection::new(TcpConnection::new(
        addr.ip().to_string(),
        addr.port(),
    )));
    let client = Client::new(
        connection,
        ClientConfig::builder()
            .update_interval_secs(3600)
            .request_timeout_ms(2000)
            .build(),
    );
    (simulator, client)
}

async fn next_state(rx: &mut EventReceiver) -> (ArmingState, Option<ArmingMode>) {
    timeout(WAIT, async {
        loop {
            if let ClientEvent::ArmingStateChanged { state, mode } = rx.recv().await.unwrap() {
                return (state, mode);
            }
        }
    })
    .await
    .expect("timed out waiting for arming state change")
}

#[tokio::test]
async fn test_arm_and_disarm_through_simulator() {
    let (_simulator, client) = start_simulator(
        SimulatorConfig::builder()
            .exit_delay_ms(100)
            .entry_delay_ms(100)
            .build(),
    )
    .await;
    let mut rx = client.subscribe();
    client.start().await;

    client.arm_away(Some("1234")).await.unwrap();
    assert_eq!(
        next_state(&mut rx).await,
        (ArmingState::Arming, Some(ArmingMode::ArmedAway))
    );
    assert_eq!(next_state(&mut rx).await.0, ArmingState::ExitDelay);
    assert_eq!(next_state(&mut rx).await.0, ArmingState::Armed);

    client.disarm("1234").await.unwrap();
    assert_eq!(next_state(&mut rx).await, (ArmingState::Disarmed, None));

    let update = client
        .send_command_and_wait("S14", WAIT)
        .await
        .unwrap();
    let StatusUpdate::Arming(arming) = update else {
        panic!("expected arming update, got {update:?}");
    };
    assert_eq!(arming.status, ArmingStatus::empty());

    client.close().await;
}

#[tokio::test]
async fn test_zone_changes_reach_client() {
    let (simulator, client) = start_simulator(SimulatorConfig::default()).await;
    client.start().await;

    simulator.set_zone(2, true).await.unwrap();
    client.update().await.unwrap();

    timeout(WAIT, async {
        while client.zone(2).await.and_then(|z| z.triggered) != Some(true) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    // The S00 response marks every other zone in the bank as sealed
    timeout(WAIT, async {
        while client.zone(1).await.and_then(|z| z.triggered) != Some(false) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    client.close().await;
}

#[tokio::test]
async fn test_panel_info_from_simulator() {
    let (_simulator, client) =
        start_simulator(SimulatorConfig::builder().version(9, 2).build()).await;
    client.start().await;

    let info = client.get_panel_info().await.unwrap();
    assert_eq!(info.version, "9.2");

    client.aux(2, true).await.unwrap();
    let outputs = client.refresh_aux_outputs().await.unwrap();
    assert!(outputs.contains(nessclient::event::AuxOutputs::AUX_2));
    timeout(WAIT, async {
        while client.aux_outputs().await[1] != Some(true) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    client.close().await;
}
