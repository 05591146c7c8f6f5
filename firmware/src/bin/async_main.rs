#![no_std]
#![no_main]

use bt_hci::controller::ExternalController;
use embassy_executor::Spawner;
use embassy_futures::join::join;
use embassy_time::{Duration, Instant, Timer};
use embedded_hal_async::i2c::I2c as AsyncI2c;
use esp_backtrace as _;
use esp_hal::i2c::master::Config;
use esp_hal::i2c::master::I2c;
use esp_hal::prelude::*;
use esp_wifi::ble::controller::BleConnector;
use log::{error, info, warn};
use slouch::{ConsoleDisplay, HistoryLog, MemoryStore, PostureMonitor, Tick};
use slouch_firmware::accelerometer::{Icm20948, ICM20948_ADDR};
use slouch_firmware::ble_config::{
    BleConfig, BleConnectionState, BleController, BleTelemetry, RECALIBRATE,
};
extern crate alloc;

type Monitor = PostureMonitor<MemoryStore, BleTelemetry, ConsoleDisplay>;

fn now_ms() -> u64 {
    Instant::now().as_millis()
}

/// Sit-upright window. Failed reads are retried, not counted, and a
/// degenerate result starts the window over.
async fn calibrate<I2C: AsyncI2c>(imu: &mut Icm20948<I2C>, monitor: &mut Monitor) {
    let interval = Duration::from_millis(monitor.config().sample_interval_ms);

    loop {
        info!(
            "=== SIT UPRIGHT for {} seconds ===",
            monitor.config().calibration_ms / 1000
        );
        Timer::after(Duration::from_millis(300)).await;

        let mut calibrator = monitor.calibrator();
        while !calibrator.is_complete() {
            match imu.get_accel().await {
                Ok(sample) => {
                    calibrator.push(sample);
                }
                Err(e) => warn!("IMU I2C glitch during calibration: {:?}", e),
            }
            Timer::after(interval).await;
        }

        match calibrator.finish() {
            Ok(baseline) => {
                monitor.set_baseline(baseline);
                info!("=== DONE ===");
                return;
            }
            Err(e) => warn!("Calibration failed ({}), starting over", e),
        }
    }
}

async fn monitor_posture<I2C: AsyncI2c>(mut imu: Icm20948<I2C>, mut monitor: Monitor) {
    let config = *monitor.config();

    calibrate(&mut imu, &mut monitor).await;
    monitor.start(now_ms());

    loop {
        if RECALIBRATE.signaled() {
            RECALIBRATE.reset();
            calibrate(&mut imu, &mut monitor).await;
        }

        let reading = imu.get_accel().await;
        // No RTC on this board; the history log is disabled so wall time is unused.
        let pause = match monitor.tick(reading, now_ms(), 0.0) {
            Tick::SensorFault => config.sensor_retry_ms,
            _ => config.sample_interval_ms,
        };
        Timer::after(Duration::from_millis(pause)).await;
    }
}

#[main]
async fn main(_spawner: Spawner) {
    let peripherals = esp_hal::init({
        let mut config = esp_hal::Config::default();
        config.cpu_clock = CpuClock::max();
        config
    });

    esp_alloc::heap_allocator!(72 * 1024);

    esp_println::logger::init_logger_from_env();

    let timer0 = esp_hal::timer::systimer::SystemTimer::new(peripherals.SYSTIMER)
        .split::<esp_hal::timer::systimer::Target>();
    esp_hal_embassy::init(timer0.alarm0);

    info!("Embassy initialized!");

    let timer1 = esp_hal::timer::timg::TimerGroup::new(peripherals.TIMG0);
    let init = match esp_wifi::init(
        timer1.timer0,
        esp_hal::rng::Rng::new(peripherals.RNG),
        peripherals.RADIO_CLK,
    ) {
        Ok(init) => init,
        Err(e) => {
            error!("Radio init failed: {:?}", e);
            panic!("Failed to initialize radio");
        }
    };

    let connector = BleConnector::new(&init, peripherals.BT);
    let controller: ExternalController<_, 20> = ExternalController::new(connector);

    let mut ble = BleController::new(BleConfig::default());
    let _ = ble.subscribe_to_state_changes(|state| match state {
        BleConnectionState::Connected => info!("Dashboard connected"),
        BleConnectionState::Disconnected => info!("Dashboard disconnected"),
        BleConnectionState::Advertising => info!("Advertising..."),
        BleConnectionState::Error(e) => warn!("BLE error: {:?}", e),
    });

    let i2c = I2c::new(peripherals.I2C0, Config::default())
        .with_sda(peripherals.GPIO1)
        .with_scl(peripherals.GPIO2)
        .into_async();

    Timer::after(Duration::from_millis(100)).await;

    let imu = match Icm20948::new(i2c, ICM20948_ADDR).await {
        Ok(imu) => imu,
        Err(e) => {
            error!("Err: {:?}", e);
            panic!("Failed to initialize ICM-20948");
        }
    };
    info!("Sensor OK.");

    let posture_config = slouch::Config::default();
    // No writable medium on this board.
    let history = HistoryLog::<MemoryStore>::open(None, &posture_config);
    let monitor = match PostureMonitor::new(
        posture_config,
        history,
        BleTelemetry::default(),
        ConsoleDisplay,
        now_ms(),
    ) {
        Ok(monitor) => monitor,
        Err(e) => {
            error!("Invalid posture configuration: {}", e);
            panic!("Failed to start posture monitor");
        }
    };

    join(ble.run(controller), monitor_posture(imu, monitor)).await;
}
