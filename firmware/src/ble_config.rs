use embassy_futures::join;
use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Timer};
use heapless::Vec;
use log::{debug, error, info, warn};
use micromath::F32Ext;
use slouch::{TelemetrySink, TelemetryUpdate};
use trouble_host::prelude::*;

/// Latest posture reading, handed from the monitor loop to the BLE task.
/// Only the newest value matters, so a signal (not a queue) carries it.
pub static POSTURE_READING: Signal<CriticalSectionRawMutex, PostureReading> = Signal::new();

/// Raised when a central writes the recalibrate characteristic.
pub static RECALIBRATE: Signal<CriticalSectionRawMutex, ()> = Signal::new();

#[gatt_server]
struct Server {
    posture_service: PostureService,
}

#[gatt_service(uuid = "5107")]
struct PostureService {
    /// Smoothed tilt in tenths of a degree.
    #[characteristic(uuid = "5108", read, notify)]
    angle: i16,
    #[characteristic(uuid = "5109", read, notify)]
    state: u8,
    #[characteristic(uuid = "510a", read, notify)]
    slouch_count: u32,
    #[characteristic(uuid = "510b", write)]
    recalibrate: u8,
}

/// Maximum number of notification subscribers
const MAX_SUBSCRIBERS: usize = 8;

/// Full snapshot as exposed over GATT.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PostureReading {
    pub angle_decideg: i16,
    pub state: u8,
    pub slouch_count: u32,
}

impl PostureReading {
    fn merge(&mut self, update: &TelemetryUpdate) {
        if let Some(angle) = update.angle {
            self.angle_decideg = (angle * 10.0).round() as i16;
        }
        if let Some(state) = update.state {
            self.state = state.code();
        }
        if let Some(count) = update.slouch_count {
            self.slouch_count = count;
        }
    }
}

/// Telemetry sink for the monitor: folds each gated update into the
/// snapshot and signals it. Never waits on the radio.
#[derive(Debug, Default)]
pub struct BleTelemetry {
    reading: PostureReading,
}

impl TelemetrySink for BleTelemetry {
    fn publish(&mut self, update: &TelemetryUpdate) {
        self.reading.merge(update);
        POSTURE_READING.signal(self.reading);
    }
}

/// Represents the current state of the BLE connection
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BleConnectionState {
    Disconnected,
    Advertising,
    Connected,
    Error(BleError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BleError {
    AdvertisingFailed,
    ConnectionFailed,
    NotificationFailed,
}

#[derive(Clone)]
pub struct BleConfig {
    pub device_name: &'static str,
    pub service_uuid: u16,
    pub min_interval: Duration,
    pub max_interval: Duration,
    pub tx_power: TxPower,
}

impl Default for BleConfig {
    fn default() -> Self {
        Self {
            device_name: "Slouch",
            service_uuid: 0x5107,
            min_interval: Duration::from_millis(100),
            max_interval: Duration::from_millis(200),
            tx_power: TxPower::Plus8dBm,
        }
    }
}

pub struct BleController {
    config: BleConfig,
    notification_subscribers: Vec<fn(BleConnectionState), MAX_SUBSCRIBERS>,
}

impl BleController {
    pub fn new(config: BleConfig) -> Self {
        Self {
            config,
            notification_subscribers: Vec::new(),
        }
    }

    pub fn subscribe_to_state_changes(
        &mut self,
        callback: fn(BleConnectionState),
    ) -> Result<(), ()> {
        match self.notification_subscribers.push(callback) {
            Ok(_) => {
                debug!("Added new state change subscriber");
                Ok(())
            }
            Err(_) => {
                warn!("Failed to add subscriber: maximum subscribers reached");
                Err(())
            }
        }
    }

    fn update_state(&mut self, new_state: BleConnectionState) {
        for subscriber in self.notification_subscribers.iter() {
            subscriber(new_state);
        }
        info!("BLE state changed to: {:?}", new_state);
    }

    /// Runs the host stack and the advertise/serve loop. Returns only if the
    /// GATT server cannot be built.
    pub async fn run<C: Controller>(&mut self, controller: C) {
        let mut resources = HostResources::<_, 1, 2, 251>::new(PacketQos::None);
        let address = Address::random([0xE5, 0x80, 0x16, 0x79, 0xCF, 0x5B]);

        info!("Setting BLE address to {:?}", address);

        let (_stack, mut peripheral, _, mut runner) = trouble_host::new(controller, &mut resources)
            .set_random_address(address)
            .build();

        let server = match Server::new_with_config(GapConfig::Peripheral(PeripheralConfig {
            name: self.config.device_name,
            appearance: &appearance::UNKNOWN,
        })) {
            Ok(server) => server,
            Err(e) => {
                error!("Failed to create GATT server: {:?}", e);
                self.update_state(BleConnectionState::Error(BleError::AdvertisingFailed));
                return;
            }
        };

        let _ = join::join(
            runner.run(),
            self.run_advertising_loop(&mut peripheral, &server),
        )
        .await;
    }

    async fn run_advertising_loop<C: Controller>(
        &mut self,
        peripheral: &mut Peripheral<'_, C>,
        server: &Server<'_>,
    ) {
        loop {
            let mut adv_data = [0; 31];
            let mut scan_data = [0; 31];
            let encoded = AdStructure::encode_slice(
                &[
                    AdStructure::Flags(LE_GENERAL_DISCOVERABLE | BR_EDR_NOT_SUPPORTED),
                    AdStructure::ServiceUuids16(&[Uuid::Uuid16(
                        self.config.service_uuid.to_le_bytes(),
                    )]),
                    AdStructure::CompleteLocalName(self.config.device_name.as_bytes()),
                ],
                &mut adv_data[..],
            )
            .and_then(|len| {
                AdStructure::encode_slice(
                    &[AdStructure::CompleteLocalName(
                        self.config.device_name.as_bytes(),
                    )],
                    &mut scan_data[..],
                )
                .map(|scan_len| (len, scan_len))
            });

            let (len, scan_len) = match encoded {
                Ok(lens) => lens,
                Err(e) => {
                    error!("Advertisement data does not fit: {:?}", e);
                    self.update_state(BleConnectionState::Error(BleError::AdvertisingFailed));
                    Timer::after(Duration::from_secs(1)).await;
                    continue;
                }
            };

            let params = AdvertisementParameters {
                interval_min: self.config.min_interval,
                interval_max: self.config.max_interval,
                tx_power: self.config.tx_power,
                ..Default::default()
            };

            self.update_state(BleConnectionState::Advertising);

            match peripheral
                .advertise(
                    &params,
                    Advertisement::ConnectableScannableUndirected {
                        adv_data: &adv_data[..len],
                        scan_data: &scan_data[..scan_len],
                    },
                )
                .await
            {
                Ok(advertiser) => match advertiser.accept().await {
                    Ok(connection) => {
                        self.update_state(BleConnectionState::Connected);
                        self.handle_connection(server, connection).await;
                    }
                    Err(e) => {
                        error!("Error accepting connection: {:?}", e);
                        self.update_state(BleConnectionState::Error(
                            BleError::ConnectionFailed,
                        ));
                    }
                },
                Err(e) => {
                    error!("Failed to start advertising: {:?}", e);
                    self.update_state(BleConnectionState::Error(BleError::AdvertisingFailed));
                }
            }

            Timer::after(Duration::from_millis(100)).await;
        }
    }

    /// Serves GATT requests and pushes posture notifications until the
    /// central disconnects.
    async fn handle_connection(&mut self, server: &Server<'_>, connection: Connection<'_>) {
        let service = &server.posture_service;
        let mut notified: Option<PostureReading> = None;

        loop {
            match select(connection.next(), POSTURE_READING.wait()).await {
                Either::First(ConnectionEvent::Gatt { data }) => match data.process(server).await {
                    Ok(Some(GattEvent::Write(write_event))) => {
                        if write_event.handle() == service.recalibrate.handle {
                            info!("Recalibration requested over BLE");
                            RECALIBRATE.signal(());
                        }
                        let _ = write_event.reply(Ok(())).await;
                    }
                    Ok(Some(GattEvent::Read(read_event))) => {
                        let _ = read_event.reply(Ok(())).await;
                    }
                    Ok(None) => {}
                    Err(e) => error!("Error processing GATT event: {:?}", e),
                },
                Either::First(ConnectionEvent::Disconnected { reason }) => {
                    info!("Client disconnected: {:?}", reason);
                    self.update_state(BleConnectionState::Disconnected);
                    break;
                }
                Either::Second(reading) => {
                    let previous = notified.unwrap_or_default();
                    let first = notified.is_none();

                    let result = async {
                        if first || reading.angle_decideg != previous.angle_decideg {
                            server
                                .notify(&service.angle, &connection, &reading.angle_decideg)
                                .await?;
                        }
                        if first || reading.state != previous.state {
                            server
                                .notify(&service.state, &connection, &reading.state)
                                .await?;
                        }
                        if first || reading.slouch_count != previous.slouch_count {
                            server
                                .notify(&service.slouch_count, &connection, &reading.slouch_count)
                                .await?;
                        }
                        Ok::<(), trouble_host::Error>(())
                    }
                    .await;

                    match result {
                        Ok(()) => notified = Some(reading),
                        Err(e) => {
                            warn!("Posture notification failed: {:?}", e);
                            self.update_state(BleConnectionState::Error(
                                BleError::NotificationFailed,
                            ));
                        }
                    }
                }
            }
        }
    }
}
