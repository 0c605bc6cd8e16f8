//! pos-hid host
//!
//! Identifies point-of-sale USB peripherals (barcode scanners, keyboards,
//! receipt printers, card readers), prints receipt markup on ESC/POS
//! printers and streams barcode scans from keyboard-wedge scanners.

mod config;
mod usb;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use common::scanner::ScanSession;
use common::{Classifier, DeviceRecord, DeviceSelector, HostBridge, HostCommand, HostEvent};
use common::{create_host_bridge, setup_logging};
use config::HostConfig;
use tokio::signal;
use tracing::{error, info, warn};
use usb::spawn_usb_worker;

#[derive(Parser, Debug)]
#[command(name = "pos-hid-host")]
#[command(
    author,
    version,
    about = "Identify POS USB peripherals, print receipts and read barcode scans"
)]
#[command(long_about = "
Classifies attached USB devices as scanner, keyboard, printer or card reader,
sends receipt markup to ESC/POS printers, and streams barcode scans from
keyboard-wedge scanners as JSON lines.

EXAMPLES:
    # List devices with their classification
    pos-hid-host --list-devices

    # Print a receipt
    pos-hid-host --print receipt.txt --device 04b8:0202

    # Show the ESC/POS bytes a receipt would produce
    pos-hid-host --render receipt.txt | xxd

    # Stream scans from a scanner until Ctrl+C
    pos-hid-host --listen 1a86:e026

    # Log hot-plug events (the default when no mode is given)
    pos-hid-host --watch

CONFIGURATION:
    The host looks for configuration files in the following order:
    1. Path specified with --config
    2. ~/.config/pos-hid/host.toml
    3. /etc/pos-hid/host.toml
    4. Built-in defaults
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// List USB devices with their classification and exit
    #[arg(long)]
    list_devices: bool,

    /// Print the device list as JSON (with --list-devices)
    #[arg(long, requires = "list_devices")]
    json: bool,

    /// Transpile a markup file and send it to --device
    #[arg(long, value_name = "FILE", requires = "device")]
    print: Option<PathBuf>,

    /// Target printer for --print (VID:PID, hex)
    #[arg(long, value_name = "VID:PID")]
    device: Option<DeviceSelector>,

    /// Transpile a markup file and write the raw bytes to stdout
    #[arg(long, value_name = "FILE")]
    render: Option<PathBuf>,

    /// Stream scans from a scanner as JSON lines (VID:PID, hex)
    #[arg(long, value_name = "VID:PID")]
    listen: Option<DeviceSelector>,

    /// Log hot-plug events with their classification
    #[arg(long)]
    watch: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.save_config {
        let config = HostConfig::default();
        let path = HostConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let config = if let Some(ref path) = args.config {
        HostConfig::load(Some(path.clone())).context("Failed to load configuration")?
    } else {
        HostConfig::load_or_default()
    };

    let log_level = args.log_level.as_deref().unwrap_or(&config.host.log_level);
    setup_logging(log_level).context("Failed to setup logging")?;

    info!("pos-hid host v{}", env!("CARGO_PKG_VERSION"));
    info!("Log level: {}", log_level);

    // Rendering is pure; no USB access needed
    if let Some(ref path) = args.render {
        return render_mode(path);
    }

    let tables = config
        .vendor_tables()
        .context("Invalid classifier configuration")?;
    let classifier = Classifier::new(Arc::new(tables));

    let (bridge, worker) = create_host_bridge();
    let worker_handle = spawn_usb_worker(worker, classifier, config.clone())
        .context("Failed to spawn USB worker thread")?;

    let result = if args.list_devices {
        list_devices_mode(&bridge, args.json).await
    } else if let Some(ref path) = args.print {
        match args.device {
            Some(device) => print_mode(&bridge, path, device).await,
            None => Err(anyhow::anyhow!("--print needs --device VID:PID")),
        }
    } else if let Some(device) = args.listen {
        listen_mode(&bridge, &config, device).await
    } else {
        if !args.watch {
            info!("No mode given, watching hot-plug events");
        }
        watch_mode(&bridge).await
    };

    info!("Shutting down USB subsystem...");
    if let Err(e) = bridge.send_command(HostCommand::Shutdown).await {
        error!("Error shutting down USB worker: {:#}", e);
    }
    match worker_handle.join() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("USB worker failed: {}", e),
        Err(e) => error!("USB worker thread panicked: {:?}", e),
    }

    result
}

fn read_markup(path: &Path) -> Result<String> {
    let path = PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref());
    std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read markup file: {}", path.display()))
}

/// Transpile a markup file to stdout
fn render_mode(path: &Path) -> Result<()> {
    let markup = read_markup(path)?;
    let job = usb::printer::render(&markup);

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(&job)
        .and_then(|()| stdout.flush())
        .context("Failed to write to stdout")?;
    info!("Rendered {} bytes", job.len());
    Ok(())
}

/// List devices and exit
async fn list_devices_mode(bridge: &HostBridge, json: bool) -> Result<()> {
    let devices = bridge
        .request(|response| HostCommand::ListDevices { response })
        .await
        .context("Failed to list devices")?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&devices).context("Failed to encode device list")?
        );
        return Ok(());
    }

    if devices.is_empty() {
        println!("No USB devices found.");
        return Ok(());
    }

    println!("Found {} USB device(s):\n", devices.len());
    for device in &devices {
        print_device(device);
    }
    Ok(())
}

fn print_device(device: &DeviceRecord) {
    let id = &device.identification;
    println!(
        "  {} - {}",
        device.selector(),
        usb::manager::display_name(&device.identity)
    );
    println!(
        "      Bus {:03} Device {:03}  Role: {} ({}, via {})",
        device.bus, device.address, id.role, id.confidence, id.rule
    );
    if id.role == protocol::Role::Keyboard {
        let layout = common::classifier::KeyboardLayout::from_product(
            device.identity.product.as_deref().unwrap_or_default(),
        );
        println!(
            "      Layout: {} (~{} keys)",
            layout.as_str(),
            layout.key_count()
        );
    }
    if let Some(usage) = device.usage {
        println!("      Usage: {}", usage);
    }
    println!();
}

/// Transpile a markup file and send it to a printer
async fn print_mode(bridge: &HostBridge, path: &Path, device: DeviceSelector) -> Result<()> {
    let markup = read_markup(path)?;

    let written = bridge
        .request(|response| HostCommand::Print {
            device,
            markup,
            response,
        })
        .await
        .context("USB worker unavailable")?
        .with_context(|| format!("Failed to print on {}", device))?;

    println!("Sent {} bytes to {}", written, device);
    Ok(())
}

/// Stream scans from a scanner until Ctrl+C
async fn listen_mode(
    bridge: &HostBridge,
    config: &HostConfig,
    device: DeviceSelector,
) -> Result<()> {
    let (session, scans) = ScanSession::spawn(config.scanner.timing());

    let record = bridge
        .request(|response| HostCommand::Listen {
            device,
            session: session.clone(),
            response,
        })
        .await
        .context("USB worker unavailable")?
        .with_context(|| format!("Cannot listen on {}", device))?;

    info!(
        "Listening on {} ({} {}, via {}); press Ctrl+C to stop",
        device,
        record.identification.role,
        record.identification.confidence,
        record.identification.rule
    );
    session.start().await?;

    let mut stdout = std::io::stdout();
    loop {
        tokio::select! {
            scan = scans.recv() => {
                let Ok(scan) = scan else {
                    bail!("Scan session ended unexpectedly");
                };
                let line = serde_json::to_string(&scan).context("Failed to encode scan")?;
                writeln!(stdout, "{}", line).context("Failed to write to stdout")?;
                stdout.flush().ok();
            }
            event = bridge.recv_event() => match event? {
                HostEvent::ListenStopped { device: stopped, reason } if stopped == device => {
                    warn!("Listening on {} stopped: {}", device, reason);
                    break;
                }
                other => log_event(&other),
            },
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C, stopping");
                break;
            }
        }
    }

    session.stop().await?;
    bridge.send_command(HostCommand::StopListening).await?;
    Ok(())
}

/// Log hot-plug events until Ctrl+C
async fn watch_mode(bridge: &HostBridge) -> Result<()> {
    let devices = bridge
        .request(|response| HostCommand::ListDevices { response })
        .await
        .context("Failed to list devices")?;
    for device in &devices {
        print_device(device);
    }
    info!("Watching for hot-plug events; press Ctrl+C to stop");

    loop {
        tokio::select! {
            event = bridge.recv_event() => log_event(&event?),
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C, stopping");
                return Ok(());
            }
        }
    }
}

fn log_event(event: &HostEvent) {
    match event {
        HostEvent::DeviceArrived { device } => {
            let id = &device.identification;
            info!(
                "Arrived: {} {} -> {} ({}, via {})",
                device.selector(),
                usb::manager::display_name(&device.identity),
                id.role,
                id.confidence,
                id.rule
            );
        }
        HostEvent::DeviceLeft { bus, address } => {
            info!("Left: bus={} addr={}", bus, address);
        }
        HostEvent::Reclassified { device, previous } => {
            info!(
                "Reclassified: {} {} ({}) -> {} ({})",
                device.selector(),
                previous.role,
                previous.confidence,
                device.identification.role,
                device.identification.confidence
            );
        }
        HostEvent::ListenStopped { device, reason } => {
            warn!("Listening on {} stopped: {}", device, reason);
        }
    }
}
