//! # Integration Tests
//!
//! Cross-crate scenarios.
//!
//! Covers:
//! - Barrier-gated rounds driven by real producer tasks
//! - Transport failure and rearm
//! - Producer -> HandoffQueue -> actuator ordering
//! - Command frames from a file source
//! - A node wired from a TOML config

#[cfg(test)]
mod contract_tests {
    use contracts::{encode_crc32_line, verify_crc32_line, Command, SensorKind};

    #[test]
    fn test_command_frame_shape() {
        let body = serde_json::to_vec(&Command {
            red: 10,
            green: 20,
            blue: 30,
            duty_cycle: 512,
        })
        .unwrap();
        let line = encode_crc32_line(&body);
        let text = std::str::from_utf8(&line).unwrap();

        assert!(text.starts_with(r#"{"RED":10,"GREEN":20,"BLUE":30,"DutyCycle":512}"#));
        assert!(text.ends_with('\n'));
        assert_eq!(verify_crc32_line(&line).unwrap(), body.as_slice());
    }

    #[test]
    fn test_kind_slots_are_dense() {
        for (i, kind) in SensorKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use actuation::{ActuatorTask, CommandChannel, LoggingLed, LoggingMotor};
    use contracts::{
        encode_crc32_line, verify_crc32_line, ActuatorConfig, ContractError, Framing, Motor,
        Reading, RoundOutcome, RoundTimeoutPolicy, SaturationPolicy, SensorKind, SlotState,
        TelemetryPayload, Transport, TransportErrorKind,
    };
    use dispatcher::{AnyTransport, Dispatcher, DispatcherConfig, FileTransport};
    use ingestion::{ProducerGroup, ProducerTask, ScriptedSensor};
    use observability::RoundStatsAggregator;
    use sync_engine::{HandoffQueue, ReadinessBarrier, SharedReadingStore};
    use tokio::sync::{mpsc, watch};
    use tokio::time::Instant;

    /// Records payloads; fails while `failing` is set
    #[derive(Clone, Default)]
    struct FlakyTransport {
        sent: Arc<Mutex<Vec<Vec<u8>>>>,
        failing: Arc<AtomicBool>,
        attempts: Arc<AtomicUsize>,
    }

    impl Transport for FlakyTransport {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn send(&mut self, payload: &[u8]) -> Result<(), ContractError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(ContractError::transport(
                    "flaky",
                    TransportErrorKind::LinkDown,
                    "no route to host",
                ));
            }
            self.sent.lock().unwrap().push(payload.to_vec());
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    impl FlakyTransport {
        fn payloads(&self) -> Vec<TelemetryPayload> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|b| serde_json::from_slice(b).unwrap())
                .collect()
        }
    }

    #[derive(Clone, Default)]
    struct RecordingMotor {
        speeds: Arc<Mutex<Vec<u16>>>,
    }

    impl Motor for RecordingMotor {
        fn set_speed(&mut self, duty: u16) -> Result<(), ContractError> {
            self.speeds.lock().unwrap().push(duty);
            Ok(())
        }
    }

    fn dispatcher_config(round_timeout: Option<Duration>, framing: Framing) -> DispatcherConfig {
        DispatcherConfig {
            device_id: "e2e-node".into(),
            participants: SensorKind::ALL.to_vec(),
            round_timeout,
            min_interval: Duration::ZERO,
            on_timeout: RoundTimeoutPolicy::Skip,
            framing,
        }
    }

    fn climate(t: f32) -> Result<Reading, contracts::SampleFailure> {
        Ok(Reading::Climate {
            temperature: t,
            humidity: 50.0,
        })
    }

    fn particulate(pm2_5: u16) -> Result<Reading, contracts::SampleFailure> {
        Ok(Reading::Particulate { pm2_5 })
    }

    fn gas(detected: bool) -> Result<Reading, contracts::SampleFailure> {
        Ok(Reading::Gas { detected })
    }

    struct Producers {
        climate: ProducerTask<ScriptedSensor>,
        particulate: ProducerTask<ScriptedSensor>,
        gas: ProducerTask<ScriptedSensor>,
    }

    fn producers(store: &Arc<SharedReadingStore>, barrier: &Arc<ReadinessBarrier>) -> Producers {
        let make = |kind, script| {
            ProducerTask::new(
                ScriptedSensor::new(kind, script),
                Duration::from_secs(1),
                Arc::clone(store),
                Arc::clone(barrier),
            )
        };
        Producers {
            climate: make(SensorKind::Climate, vec![climate(21.0), climate(22.0)]),
            particulate: make(SensorKind::Particulate, vec![particulate(35), particulate(36)]),
            gas: make(SensorKind::Gas, vec![gas(false), gas(true)]),
        }
    }

    /// Producers signal at t=0, 1, 2; the round completes at t=2 and not before
    #[tokio::test(start_paused = true)]
    async fn test_round_unblocks_on_last_signal() {
        let store = Arc::new(SharedReadingStore::new());
        let barrier = Arc::new(ReadinessBarrier::new(&SensorKind::ALL));
        let transport = FlakyTransport::default();
        let Producers {
            mut climate,
            mut particulate,
            mut gas,
        } = producers(&store, &barrier);

        let mut dispatcher = Dispatcher::new(
            dispatcher_config(None, Framing::Plain),
            Arc::clone(&store),
            Arc::clone(&barrier),
            transport.clone(),
        );

        let start = Instant::now();
        let round = tokio::spawn(async move {
            let report = dispatcher.run_round().await;
            (report, start.elapsed())
        });

        tokio::spawn(async move {
            particulate.cycle().await;
        });
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            gas.cycle().await;
        });
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            climate.cycle().await;
        });

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(barrier.count(), 2);
        assert!(transport.payloads().is_empty());

        let (report, elapsed) = round.await.unwrap();
        assert_eq!(elapsed, Duration::from_secs(2));
        assert_eq!(report.outcome, RoundOutcome::Sent);
        assert!(report.missing.is_empty());

        let payloads = transport.payloads();
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].temperature, Some(21.0));
        assert_eq!(payloads[0].pm2_5, Some(35));
        assert_eq!(payloads[0].gas, Some(false));
    }

    /// A fast producer cannot stand in for a slow one
    #[tokio::test(start_paused = true)]
    async fn test_fast_producer_coalesces() {
        let store = Arc::new(SharedReadingStore::new());
        let barrier = Arc::new(ReadinessBarrier::new(&SensorKind::ALL));
        let transport = FlakyTransport::default();
        let Producers {
            mut climate,
            mut particulate,
            mut gas,
        } = producers(&store, &barrier);
        let fast_metrics = particulate.metrics();

        let mut dispatcher = Dispatcher::new(
            dispatcher_config(None, Framing::Plain),
            Arc::clone(&store),
            Arc::clone(&barrier),
            transport.clone(),
        );
        let start = Instant::now();
        let round = tokio::spawn(async move {
            let report = dispatcher.run_round().await;
            (report, start.elapsed())
        });

        gas.cycle().await;
        for _ in 0..5 {
            particulate.cycle().await;
            assert!(barrier.count() <= 2);
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        assert!(transport.payloads().is_empty());

        climate.cycle().await;
        let (report, elapsed) = round.await.unwrap();
        assert_eq!(report.outcome, RoundOutcome::Sent);
        assert_eq!(elapsed, Duration::from_secs(5));
        assert_eq!(fast_metrics.snapshot().coalesced, 4);
        assert_eq!(barrier.count(), 0);
    }

    /// Transport error: the barrier is rearmed and the next full round goes out
    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_then_fresh_round() {
        let store = Arc::new(SharedReadingStore::new());
        let barrier = Arc::new(ReadinessBarrier::new(&SensorKind::ALL));
        let transport = FlakyTransport::default();
        transport.failing.store(true, Ordering::SeqCst);
        let mut p = producers(&store, &barrier);

        let mut dispatcher = Dispatcher::new(
            dispatcher_config(Some(Duration::from_secs(30)), Framing::Plain),
            Arc::clone(&store),
            Arc::clone(&barrier),
            transport.clone(),
        );

        p.climate.cycle().await;
        p.particulate.cycle().await;
        p.gas.cycle().await;
        let first = dispatcher.run_round().await;
        assert_eq!(first.outcome, RoundOutcome::TransportFailed);
        assert_eq!(barrier.count(), 0);

        // idempotent
        barrier.rearm();
        barrier.rearm();
        assert_eq!(barrier.count(), 0);

        transport.failing.store(false, Ordering::SeqCst);
        p.climate.cycle().await;
        p.particulate.cycle().await;
        p.gas.cycle().await;
        assert_eq!(barrier.count(), 3);

        let second = dispatcher.run_round().await;
        assert_eq!(second.outcome, RoundOutcome::Sent);
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 2);

        let payloads = transport.payloads();
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].round, 2);
        assert_eq!(payloads[0].temperature, Some(22.0));
        assert_eq!(payloads[0].gas, Some(true));
    }

    /// A failed sample still completes the round; its field goes out as null
    #[tokio::test(start_paused = true)]
    async fn test_sample_failure_counts_toward_round() {
        let store = Arc::new(SharedReadingStore::new());
        let barrier = Arc::new(ReadinessBarrier::new(&SensorKind::ALL));
        let transport = FlakyTransport::default();
        let mut p = producers(&store, &barrier);
        let mut broken = ProducerTask::new(
            ScriptedSensor::new(
                SensorKind::Climate,
                vec![Ok(Reading::Climate {
                    temperature: f32::NAN,
                    humidity: 40.0,
                })],
            ),
            Duration::from_secs(5),
            Arc::clone(&store),
            Arc::clone(&barrier),
        );

        let mut dispatcher = Dispatcher::new(
            dispatcher_config(Some(Duration::from_secs(30)), Framing::Plain),
            Arc::clone(&store),
            Arc::clone(&barrier),
            transport.clone(),
        );

        broken.cycle().await;
        p.particulate.cycle().await;
        p.gas.cycle().await;
        let report = dispatcher.run_round().await;

        assert_eq!(report.outcome, RoundOutcome::Sent);
        assert_eq!(report.missing, vec![SensorKind::Climate]);
        assert!(matches!(
            store.read(SensorKind::Climate),
            SlotState::Failed { .. }
        ));
        let payload = &transport.payloads()[0];
        assert_eq!(payload.temperature, None);
        assert_eq!(payload.missing, vec![SensorKind::Climate]);
        assert!(!payload.partial);
    }

    /// Concurrent writers never produce a payload mixing two climate samples
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_no_torn_payload_under_concurrent_writes() {
        let store = Arc::new(SharedReadingStore::new());
        let barrier = Arc::new(ReadinessBarrier::new(&SensorKind::ALL));
        let transport = FlakyTransport::default();
        let stop = Arc::new(AtomicBool::new(false));

        let writer = {
            let store = Arc::clone(&store);
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || {
                let mut i = 0u32;
                while !stop.load(Ordering::Relaxed) {
                    let v = (i % 1000) as f32;
                    store.write(
                        SensorKind::Climate,
                        SlotState::Fresh {
                            reading: Reading::Climate {
                                temperature: v,
                                humidity: v,
                            },
                        },
                    );
                    i = i.wrapping_add(1);
                }
            })
        };

        let mut dispatcher = Dispatcher::new(
            dispatcher_config(Some(Duration::from_secs(5)), Framing::Plain),
            Arc::clone(&store),
            Arc::clone(&barrier),
            transport.clone(),
        );
        for _ in 0..200 {
            for kind in SensorKind::ALL {
                barrier.signal(kind);
            }
            dispatcher.run_round().await;
        }
        stop.store(true, Ordering::Relaxed);
        writer.join().unwrap();

        let payloads = transport.payloads();
        assert_eq!(payloads.len(), 200);
        for p in payloads.iter().filter(|p| p.temperature.is_some()) {
            assert_eq!(p.temperature, p.humidity);
        }
    }

    /// Particulate producer -> HandoffQueue -> ActuatorTask, in push order
    #[tokio::test(start_paused = true)]
    async fn test_handoff_drives_motor_in_order() {
        let store = Arc::new(SharedReadingStore::new());
        let barrier = Arc::new(ReadinessBarrier::new(&SensorKind::ALL));
        let queue = Arc::new(HandoffQueue::new(
            10,
            SaturationPolicy::Reject,
            Duration::from_millis(50),
        ));

        let mut producer = ProducerTask::new(
            ScriptedSensor::new(
                SensorKind::Particulate,
                vec![particulate(5), particulate(80), particulate(200)],
            ),
            Duration::from_secs(2),
            Arc::clone(&store),
            Arc::clone(&barrier),
        )
        .with_handoff(Arc::clone(&queue))
        .unwrap();

        for _ in 0..3 {
            assert!(producer.cycle().await.handoff.unwrap().is_accepted());
        }
        assert_eq!(queue.len(), 3);

        let motor = RecordingMotor::default();
        let config = ActuatorConfig {
            initial_duty: 100,
            ..Default::default()
        };
        let actuator = ActuatorTask::new(motor.clone(), Arc::clone(&queue), &config);
        let metrics = actuator.metrics();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(actuator.run(shutdown_rx));

        while metrics.snapshot().values_applied < 3 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        // initial duty first, then 5 -> 0, 80 -> 504, 200 -> 1023
        assert_eq!(*motor.speeds.lock().unwrap(), vec![100, 0, 504, 1023]);
        assert!(queue.is_empty());
    }

    /// Saturated queue under drop_oldest keeps the newest values
    #[tokio::test(start_paused = true)]
    async fn test_handoff_drop_oldest_under_slow_actuator() {
        let store = Arc::new(SharedReadingStore::new());
        let barrier = Arc::new(ReadinessBarrier::new(&SensorKind::ALL));
        let queue = Arc::new(HandoffQueue::new(
            2,
            SaturationPolicy::DropOldest,
            Duration::from_millis(50),
        ));
        let mut producer = ProducerTask::new(
            ScriptedSensor::new(
                SensorKind::Particulate,
                vec![particulate(1), particulate(2), particulate(3)],
            ),
            Duration::from_secs(2),
            Arc::clone(&store),
            Arc::clone(&barrier),
        )
        .with_handoff(Arc::clone(&queue))
        .unwrap();
        let metrics = producer.metrics();

        for _ in 0..3 {
            producer.cycle().await;
        }

        assert_eq!(metrics.snapshot().handoff_evicted, 1);
        assert_eq!(queue.try_pop(), Some(2));
        assert_eq!(queue.try_pop(), Some(3));
    }

    /// Frames read from a file: good frames applied, corrupted ones never
    #[tokio::test(start_paused = true)]
    async fn test_command_file_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("commands.txt");

        let mut corrupted = encode_crc32_line(br#"{"RED":10,"GREEN":20,"BLUE":30,"DutyCycle":900}"#);
        let digit = corrupted.len() - 2;
        corrupted[digit] = if corrupted[digit] == b'0' { b'1' } else { b'0' };

        let mut content = Vec::new();
        content.extend_from_slice(&corrupted);
        content.extend_from_slice(&encode_crc32_line(
            br#"{"RED":1,"GREEN":2,"BLUE":3,"DutyCycle":256}"#,
        ));
        content.extend_from_slice(&encode_crc32_line(br#"{"RED":"x"}"#));
        std::fs::write(&path, &content).unwrap();

        // read the file up front; paused time and blocking file I/O do not mix
        let source = std::io::Cursor::new(std::fs::read(&path).unwrap());
        let led = LoggingLed::new("status");
        let motor = LoggingMotor::new("fan", 1023);
        let channel = CommandChannel::new(
            source,
            led.clone(),
            motor.clone(),
            1023,
            Duration::from_millis(100),
        );
        let metrics = channel.metrics();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(channel.run(shutdown_rx));

        tokio::time::sleep(Duration::from_secs(1)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.integrity_rejects, 1);
        assert_eq!(snapshot.decode_rejects, 1);
        assert_eq!(snapshot.commands_applied, 1);
        assert_eq!(motor.writes(), 1);
        assert_eq!(motor.duty(), 256);
        assert_eq!(led.color(), (1, 2, 3));
    }

    /// CRC32-framed rounds land in a file, one verifiable line each
    #[tokio::test]
    async fn test_file_transport_crc32_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("uplink.log");

        let store = Arc::new(SharedReadingStore::new());
        let barrier = Arc::new(ReadinessBarrier::new(&SensorKind::ALL));
        let transport = FileTransport::new("file", dispatcher::FileTransportConfig {
            path: path.clone(),
        })
        .await
        .unwrap();
        let mut p = producers(&store, &barrier);
        let mut dispatcher = Dispatcher::new(
            dispatcher_config(Some(Duration::from_secs(5)), Framing::Crc32Line),
            Arc::clone(&store),
            Arc::clone(&barrier),
            transport,
        );

        for _ in 0..2 {
            p.climate.cycle().await;
            p.particulate.cycle().await;
            p.gas.cycle().await;
            assert_eq!(dispatcher.run_round().await.outcome, RoundOutcome::Sent);
        }

        let content = tokio::fs::read(&path).await.unwrap();
        let lines: Vec<&[u8]> = content
            .split_inclusive(|b| *b == b'\n')
            .collect();
        assert_eq!(lines.len(), 2);
        for (i, line) in lines.iter().enumerate() {
            let body = verify_crc32_line(line).unwrap();
            let payload: TelemetryPayload = serde_json::from_slice(body).unwrap();
            assert_eq!(payload.device_id, "e2e-node");
            assert_eq!(payload.round, i as u64 + 1);
        }
    }

    /// TOML config -> full node -> rounds on a file uplink
    #[tokio::test]
    async fn test_node_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rounds.jsonl");
        let toml = format!(
            r#"
[node]
device_id = "cfg-node"

[[producers]]
kind = "climate"
period_ms = 40
[producers.simulation]
seed = 1

[[producers]]
kind = "particulate"
period_ms = 20
handoff = true
[producers.simulation]
seed = 2

[[producers]]
kind = "gas"
period_ms = 30
[producers.simulation]
seed = 3

[dispatch]
round_timeout_ms = 2000
min_interval_ms = 0

[transport]
kind = "file"
[transport.params]
path = "{}"
"#,
            path.display()
        );
        let blueprint =
            config_loader::ConfigLoader::load_from_str(&toml, config_loader::ConfigFormat::Toml)
                .unwrap();

        let store = Arc::new(SharedReadingStore::new());
        let barrier = Arc::new(ReadinessBarrier::new(&blueprint.participants()));
        let queue = Arc::new(HandoffQueue::<u16>::from_config(&blueprint.handoff));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let transport = AnyTransport::from_config(&blueprint.transport)
            .await
            .unwrap();
        let (report_tx, mut report_rx) = mpsc::channel(16);
        let dispatcher = Dispatcher::new(
            DispatcherConfig::from_blueprint(&blueprint),
            Arc::clone(&store),
            Arc::clone(&barrier),
            transport,
        )
        .with_reports(report_tx);
        let dispatcher_handle = tokio::spawn(dispatcher.run(shutdown_rx.clone()));

        let motor = LoggingMotor::new("fan", blueprint.actuator.max_duty);
        let actuator = ActuatorTask::new(motor.clone(), Arc::clone(&queue), &blueprint.actuator);
        let actuator_metrics = actuator.metrics();
        let actuator_handle = tokio::spawn(actuator.run(shutdown_rx.clone()));

        let producers = ProducerGroup::from_blueprint(
            &blueprint,
            &store,
            &barrier,
            Some(&queue),
            shutdown_rx,
        )
        .unwrap();
        assert_eq!(producers.len(), 3);

        let mut aggregator = RoundStatsAggregator::new();
        let collect = async {
            while aggregator.total_rounds < 3 {
                let report = report_rx.recv().await.unwrap();
                aggregator.update(&report);
            }
        };
        tokio::time::timeout(Duration::from_secs(10), collect)
            .await
            .unwrap();

        shutdown_tx.send(true).unwrap();
        let producer_metrics = producers.join().await;
        dispatcher_handle.await.unwrap();
        actuator_handle.await.unwrap();

        assert_eq!(aggregator.sent, 3);
        assert!(producer_metrics.iter().all(|(_, m)| m.samples > 0));
        assert!(actuator_metrics.snapshot().values_applied > 0);

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        let payloads: Vec<TelemetryPayload> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert!(payloads.len() >= 3);
        assert!(payloads.iter().all(|p| p.device_id == "cfg-node"));
        assert!(payloads.iter().all(|p| p.missing.is_empty()));
    }
}
