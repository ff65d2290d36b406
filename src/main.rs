//! PD-Stepper firmware — main entry point.
//!
//! Hexagonal architecture: the domain core (position model, motion
//! controller, schedule executor) talks to the world only through port
//! traits, and this file wires the production adapters into them.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                     Adapters (outer ring)                     │
//! │                                                               │
//! │  NvsAdapter    HttpFetcher   WifiAdapter    Esp32TimeAdapter  │
//! │  (Storage+Cfg) (FetchPort)   (Connectivity) (ClockPort)       │
//! │  Tmc2209Driver As5600Encoder LogEventSink                     │
//! │  (StepperPort) (EncoderPort) (EventSink)                      │
//! │                                                               │
//! │  ─────────────── Port Trait Boundary ─────────────────────    │
//! │                                                               │
//! │  ┌───────────────────────────────────────────────────────┐    │
//! │  │  PositionModel · MotionController · ScheduleExecutor  │    │
//! │  └───────────────────────────────────────────────────────┘    │
//! └───────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::time::Duration;

use anyhow::{Result, anyhow};
use log::{error, info, warn};

use pdstepper::adapters::device_id;
use pdstepper::adapters::http::HttpFetcher;
use pdstepper::adapters::log_sink::LogEventSink;
use pdstepper::adapters::nvs::{self, NvsAdapter};
use pdstepper::adapters::time::Esp32TimeAdapter;
use pdstepper::adapters::wifi::{WifiAdapter, WifiState};
use pdstepper::app::events::AppEvent;
use pdstepper::app::ports::{ConfigPort, EncoderPort, EventSink};
use pdstepper::config::SystemConfig;
use pdstepper::drivers::{hw_init, stepper::Tmc2209Driver, watchdog::Watchdog};
use pdstepper::motion::MotionController;
use pdstepper::position::PositionModel;
use pdstepper::schedule::executor::{CycleOutcome, ResyncPolicy, ScheduleExecutor};
use pdstepper::schedule::verify::HmacSha256Verifier;
use pdstepper::sensors::encoder::As5600Encoder;

/// Boot-time encoder disagreement beyond which the stored calibration is
/// flagged as suspect (half a step short of meaningless).
const CALIBRATION_SUSPECT_DEG: f32 = 45.0;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init().map_err(|e| anyhow!("logger init failed: {e:?}"))?;

    info!("PD-Stepper v{}", env!("CARGO_PKG_VERSION"));

    // ── 2. Hardware bring-up ──────────────────────────────────
    if let Err(e) = hw_init::init_peripherals() {
        // Without working GPIO/I2C there is nothing useful to do; the
        // TWDT is not armed yet, so park here visibly.
        error!("peripheral init failed: {e} — halting");
        loop {
            std::thread::sleep(Duration::from_secs(1));
        }
    }
    let watchdog = Watchdog::new();

    // ── 3. Config + identity ──────────────────────────────────
    let mut storage = NvsAdapter::new().map_err(|e| anyhow!("NVS init failed: {e}"))?;
    let config = storage.load().unwrap_or_else(|e| {
        warn!("config load failed ({e}), using defaults");
        SystemConfig::default()
    });
    let dev_id = device_id::effective_device_id(&config);
    info!("device ID: {dev_id}");

    let mut sink = LogEventSink::new();

    // ── 4. Network ────────────────────────────────────────────
    let peripherals = esp_idf_svc::hal::peripherals::Peripherals::take()
        .map_err(|e| anyhow!("peripherals: {e}"))?;
    let sysloop = esp_idf_svc::eventloop::EspSystemEventLoop::take()
        .map_err(|e| anyhow!("sysloop: {e}"))?;
    let nvs_partition = esp_idf_svc::nvs::EspDefaultNvsPartition::take()
        .map_err(|e| anyhow!("nvs partition: {e}"))?;

    let mut wifi = WifiAdapter::new(peripherals.modem, sysloop, nvs_partition)
        .map_err(|e| anyhow!("wifi init failed: {e}"))?;
    match (
        storage.read_credential_str(nvs::WIFI_SSID_CRED),
        storage.read_credential_str(nvs::WIFI_PASS_CRED),
    ) {
        (Ok(ssid), Ok(pass)) => {
            if let Err(e) = wifi.set_credentials(&ssid, &pass) {
                warn!("stored WiFi credentials invalid: {e}");
            } else if let Err(e) = wifi.connect() {
                warn!("initial WiFi connect failed: {e} (will retry)");
            }
        }
        _ => warn!("no WiFi credentials provisioned; schedule polling will stall"),
    }

    let clock = Esp32TimeAdapter::new();
    // Handle must stay alive for the background sync to keep running.
    let _sntp = clock.start_sntp();

    // ── 5. Schedule verifier ──────────────────────────────────
    // The signing key is mandatory: without it no schedule can ever be
    // trusted, so refuse to poll at all rather than act on anything.
    let verifier = match storage
        .read_credential_str(nvs::SIGNING_KEY_CRED)
        .ok()
        .and_then(|hex| HmacSha256Verifier::from_hex_key(&hex).ok())
    {
        Some(v) => v,
        None => {
            error!("no schedule signing key provisioned — refusing to poll");
            loop {
                watchdog.feed();
                std::thread::sleep(Duration::from_secs(10));
            }
        }
    };

    // ── 6. Domain core ────────────────────────────────────────
    let mut model = PositionModel::load(&storage, &dev_id, config.step_to_deg, config.closed_angle_deg)
        .map_err(|e| anyhow!("position model: {e}"))?;
    let mut stepper = Tmc2209Driver::new(config.step_pulse_half_period_us);
    let mut motion = MotionController::new();
    let mut encoder = As5600Encoder::new();
    let mut executor = ScheduleExecutor::load(&storage, &dev_id, &dev_id, config.clone())
        .map_err(|e| anyhow!("executor: {e}"))?;
    let mut fetcher = HttpFetcher::new();

    sink.emit(AppEvent::Started {
        restored_position_deg: model.current_deg(),
    });

    // ── 7. Boot calibration check ─────────────────────────────
    // The encoder only sees the shaft modulo one turn, so this cannot
    // recover missed revolutions — it can only flag that the stored
    // position looks wrong and let an operator re-home.
    match encoder.read_angle_deg() {
        Ok(encoder_deg) => {
            let err = model.shaft_disagreement_deg(encoder_deg);
            if err.abs() > CALIBRATION_SUSPECT_DEG {
                sink.emit(AppEvent::CalibrationSuspect {
                    encoder_deg,
                    expected_deg: model.current_deg().rem_euclid(360.0),
                });
            }
        }
        Err(e) => warn!("boot encoder read failed: {e}"),
    }

    info!(
        "entering poll loop (interval {}s, watermark {})",
        config.poll_interval_secs,
        executor.watermark()
    );

    // ── 8. Poll loop ──────────────────────────────────────────
    let mut resync = ResyncPolicy::new(config.resync_interval_polls, config.resync_tolerance_deg);
    loop {
        watchdog.feed();
        wifi.poll();

        let outcome = executor.run_cycle(
            &verifier,
            &mut fetcher,
            &wifi,
            &clock,
            &mut model,
            &mut motion,
            &mut stepper,
            &mut storage,
            &mut sink,
        );
        watchdog.feed();

        let sleep_secs = match outcome {
            CycleOutcome::Applied(n) => {
                info!("cycle: applied {n} event(s)");
                u64::from(config.poll_interval_secs)
            }
            CycleOutcome::NoneDue => u64::from(config.poll_interval_secs),
            // Fixed backoff for every failure mode, no growth, no jitter.
            CycleOutcome::NotSynced
            | CycleOutcome::FetchFailed(_)
            | CycleOutcome::Rejected(_)
            | CycleOutcome::ParseFailed(_)
            | CycleOutcome::MotionFailed => u64::from(config.retry_backoff_secs),
        };

        // While the link is down, the reconnect backoff paces the loop
        // instead of the schedule interval.
        let sleep_secs = match wifi.state() {
            WifiState::Reconnecting { .. } => u64::from(wifi.backoff_secs()),
            _ => sleep_secs,
        };

        // Encoder drift correction, only between moves on clean cycles.
        resync.after_cycle(&outcome, &mut encoder, &mut model, &mut storage, &mut sink);

        // Sleep in watchdog-sized slices.
        let mut remaining = sleep_secs;
        while remaining > 0 {
            let slice = remaining.min(5);
            std::thread::sleep(Duration::from_secs(slice));
            watchdog.feed();
            remaining -= slice;
        }
    }
}
