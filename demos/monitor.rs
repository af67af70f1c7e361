use std::env;

use airzone_cloud::{Platform, PlatformConfig};

/// Stand-in for the host scheduler: discovers entities, then polls them on the
/// configured interval and prints each zone.
#[tokio::main]
async fn main() -> airzone_cloud::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let config = match args.get(1) {
        Some(path) => PlatformConfig::from_json_str(&std::fs::read_to_string(path)?)?,
        None => {
            let username = env::var("AIRZONE_USERNAME").expect("usage: monitor [config.json]");
            let password = env::var("AIRZONE_PASSWORD").expect("AIRZONE_PASSWORD not set");
            PlatformConfig::new(username, password)
        }
    };

    println!("Signing in to {}...", config.url_api);
    let mut platform = Platform::setup(&config).await?;
    if let Some(session) = platform.client().session().await {
        println!("Signed in as {}", session.email);
    }
    println!(
        "Found {} zones in {} systems. Polling every {:?}...",
        platform.zones().len(),
        platform.systems().len(),
        platform.scan_interval()
    );

    let mut interval = tokio::time::interval(platform.scan_interval());
    loop {
        interval.tick().await;
        if let Err(e) = platform.poll_all().await {
            eprintln!("Poll error: {e}");
            if e.is_fatal() {
                return Err(e);
            }
        }
        for zone in platform.zones() {
            let fmt_temp =
                |t: Option<f64>| t.map_or("--".to_string(), |v| format!("{v:.1}\u{00b0}C"));
            println!(
                "[{}] {} / target {} | mode: {} | action: {}{}",
                zone.display_name(),
                fmt_temp(zone.current_temperature()),
                fmt_temp(zone.target_temperature()),
                zone.hvac_mode(),
                zone.hvac_action().as_str(),
                if zone.available() { "" } else { " | UNAVAILABLE" },
            );
        }
    }
}
