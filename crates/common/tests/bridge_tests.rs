//! Host bridge tests: Tokio side talking to a blocking worker thread

use std::thread;

use common::channel::{DeviceSelector, HostCommand, HostEvent, create_host_bridge};
use common::scanner::{FramerTiming, Key, ScanSession, SessionInput};
use common::test_utils::{
    DEFAULT_TEST_TIMEOUT, mock_printer, mock_record, mock_scanner, with_timeout,
};
use common::Error;
use protocol::Role;

mod requests {
    use super::*;

    #[tokio::test]
    async fn test_list_devices_round_trip() {
        let (bridge, worker) = create_host_bridge();

        let handle = thread::spawn(move || {
            let HostCommand::ListDevices { response } = worker.recv_command().unwrap() else {
                panic!("expected ListDevices");
            };
            response
                .send(vec![
                    mock_record(1, 2, mock_scanner(0x1a86, "USB Scanner")),
                    mock_record(1, 3, mock_printer(0x04b8, "TM-T20")),
                ])
                .unwrap();
        });

        let devices = with_timeout(
            DEFAULT_TEST_TIMEOUT,
            bridge.request(|response| HostCommand::ListDevices { response }),
        )
        .await
        .unwrap()
        .unwrap();
        handle.join().unwrap();

        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].identification.role, Role::Scanner);
        assert_eq!(devices[1].identification.role, Role::Printer);
    }

    #[tokio::test]
    async fn test_print_error_is_returned() {
        let (bridge, worker) = create_host_bridge();

        let handle = thread::spawn(move || {
            let HostCommand::Print {
                device,
                markup,
                response,
            } = worker.recv_command().unwrap()
            else {
                panic!("expected Print");
            };
            assert_eq!(device, DeviceSelector::new(0x04b8, 0x0202));
            assert_eq!(markup, "**Total**");
            response
                .send(Err(Error::Transport("bulk write timed out".into())))
                .unwrap();
        });

        let result = bridge
            .request(|response| HostCommand::Print {
                device: DeviceSelector::new(0x04b8, 0x0202),
                markup: "**Total**".to_string(),
                response,
            })
            .await
            .unwrap();
        handle.join().unwrap();

        assert!(matches!(result, Err(Error::Transport(_))));
    }

    #[tokio::test]
    async fn test_dropped_responder_is_channel_error() {
        let (bridge, worker) = create_host_bridge();

        let handle = thread::spawn(move || {
            // Worker consumes the command without answering
            let _ = worker.recv_command().unwrap();
        });

        let result = bridge
            .request(|response| HostCommand::ListDevices { response })
            .await;
        handle.join().unwrap();

        assert!(matches!(result, Err(Error::Channel(_))));
    }
}

mod events {
    use super::*;

    #[tokio::test]
    async fn test_hotplug_events_in_order() {
        let (bridge, worker) = create_host_bridge();

        let handle = thread::spawn(move || {
            let record = mock_record(2, 7, mock_scanner(0x1a86, "USB Scanner"));
            worker
                .send_event(HostEvent::DeviceArrived { device: record })
                .unwrap();
            worker
                .send_event(HostEvent::DeviceLeft { bus: 2, address: 7 })
                .unwrap();
        });

        let first = with_timeout(DEFAULT_TEST_TIMEOUT, bridge.recv_event())
            .await
            .unwrap()
            .unwrap();
        let second = with_timeout(DEFAULT_TEST_TIMEOUT, bridge.recv_event())
            .await
            .unwrap()
            .unwrap();
        handle.join().unwrap();

        assert!(matches!(first, HostEvent::DeviceArrived { ref device } if device.address == 7));
        assert!(matches!(second, HostEvent::DeviceLeft { bus: 2, address: 7 }));
    }

    #[tokio::test]
    async fn test_worker_gone_closes_event_stream() {
        let (bridge, worker) = create_host_bridge();
        drop(worker);

        assert!(matches!(bridge.recv_event().await, Err(Error::Channel(_))));
        assert!(bridge.send_command(HostCommand::Shutdown).await.is_err());
    }
}

mod listening {
    use super::*;

    #[tokio::test]
    async fn test_listen_forwards_keys_from_worker() {
        let (bridge, worker) = create_host_bridge();
        let (session, scans) = ScanSession::spawn(FramerTiming::default());
        session.start().await.unwrap();

        let handle = thread::spawn(move || {
            let HostCommand::Listen {
                device,
                session,
                response,
            } = worker.recv_command().unwrap()
            else {
                panic!("expected Listen");
            };
            let record = mock_record(1, 5, mock_scanner(device.vendor_id, "USB Scanner"));
            response.send(Ok(record)).unwrap();

            for c in "96385074".chars() {
                session
                    .send_blocking(SessionInput::Key(Key::from_char(c)))
                    .unwrap();
            }
            session.send_blocking(SessionInput::Key(Key::Enter)).unwrap();
        });

        let record = bridge
            .request(|response| HostCommand::Listen {
                device: DeviceSelector::new(0x1a86, 0x0001),
                session: session.clone(),
                response,
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.identification.role, Role::Scanner);

        let scan = with_timeout(DEFAULT_TEST_TIMEOUT, scans.recv())
            .await
            .unwrap()
            .unwrap();
        handle.join().unwrap();
        assert_eq!(scan.content, "96385074");
        assert_eq!(scan.symbology.display_name(), "EAN-8");
    }
}
