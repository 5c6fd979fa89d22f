use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use hazend_core::{AmbientReadings, Config, GeoPoint, RiskRequest, RiskService, TimeWindow};
use inquire::{Password, Text};
use std::path::PathBuf;

use crate::server;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "hazend", version, about = "HazEnd wildfire-risk backend")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server.
    Serve {
        /// Listen address; overrides the config file and HAZEND_ADDRESS.
        #[arg(long)]
        address: Option<String>,
    },

    /// Interactively store Earth Engine and OpenRouter credentials.
    Configure,

    /// Run one assessment and print the JSON report.
    #[command(allow_negative_numbers = true)]
    Assess {
        #[arg(long, default_value_t = 0.0)]
        lat: f64,

        #[arg(long, default_value_t = 0.0)]
        lon: f64,

        /// First day of the lookup window (YYYY-MM-DD); defaults to 30 days ago.
        #[arg(long)]
        start: Option<NaiveDate>,

        /// End of the lookup window (YYYY-MM-DD); defaults to today.
        #[arg(long)]
        end: Option<NaiveDate>,

        #[command(flatten)]
        readings: ReadingArgs,
    },
}

/// Optional ambient readings, same names as the `/gee-data` query parameters.
#[derive(Debug, Args)]
pub struct ReadingArgs {
    #[arg(long)]
    temperature: Option<f64>,
    #[arg(long)]
    humidity: Option<f64>,
    #[arg(long)]
    precipitation: Option<f64>,
    #[arg(long)]
    windspeed: Option<f64>,
    #[arg(long)]
    aqi: Option<f64>,
    #[arg(long)]
    elevation: Option<f64>,
    #[arg(long)]
    pm25: Option<f64>,
    #[arg(long)]
    pm10: Option<f64>,
    #[arg(long)]
    o3: Option<f64>,
    #[arg(long)]
    no2: Option<f64>,
    #[arg(long)]
    so2: Option<f64>,
    #[arg(long)]
    co: Option<f64>,
}

impl From<ReadingArgs> for AmbientReadings {
    fn from(args: ReadingArgs) -> Self {
        AmbientReadings {
            temperature: args.temperature,
            humidity: args.humidity,
            precipitation: args.precipitation,
            windspeed: args.windspeed,
            aqi: args.aqi,
            elevation: args.elevation,
            pm25: args.pm25,
            pm10: args.pm10,
            o3: args.o3,
            no2: args.no2,
            so2: args.so2,
            co: args.co,
        }
    }
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Serve { address } => {
                let config = Config::load()?;
                let address = address.unwrap_or_else(|| config.server.address.clone());

                let service = RiskService::from_config(&config);
                if config.is_earth_engine_configured() {
                    service.check_credentials().await;
                } else {
                    log::warn!(
                        "Earth Engine initialization failed: no key file or access token configured"
                    );
                }
                if config.openrouter_api_key().is_none() {
                    log::warn!("No OpenRouter API key configured; predictions will carry an error");
                }

                server::run(&address, service).await?;
            }
            Command::Configure => configure()?,
            Command::Assess { lat, lon, start, end, readings } => {
                let config = Config::load()?;
                let service = RiskService::from_config(&config);

                let request = RiskRequest {
                    point: GeoPoint::new(lat, lon),
                    window: TimeWindow::last_30_days().with_overrides(start, end),
                    readings: readings.into(),
                };

                let report = service.assess(request).await?;
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }

        Ok(())
    }
}

/// Prompt for credentials and write them to the config file.
fn configure() -> anyhow::Result<()> {
    let mut config = Config::load_file()?;
    let ee = &mut config.earth_engine;

    let current_key = ee.key_file.as_ref().map(|p| p.display().to_string()).unwrap_or_default();
    let key_file = Text::new("Earth Engine service-account key file:")
        .with_initial_value(&current_key)
        .prompt()?;
    ee.key_file = non_empty(key_file).map(PathBuf::from);

    let account = Text::new("Service-account email (blank to use the key's client_email):")
        .with_initial_value(ee.service_account.as_deref().unwrap_or_default())
        .prompt()?;
    ee.service_account = non_empty(account);

    let project = Text::new("Cloud project (blank to use the key's project_id):")
        .with_initial_value(ee.project.as_deref().unwrap_or_default())
        .prompt()?;
    ee.project = non_empty(project);

    let api_key = Password::new("OpenRouter API key (blank to keep current):")
        .without_confirmation()
        .prompt()?;
    if let Some(api_key) = non_empty(api_key) {
        config.openrouter.api_key = Some(api_key);
    }

    config.save()?;

    let path = Config::config_file_path().context("Saved, but could not resolve config path")?;
    println!("Configuration saved to {}", path.display());
    Ok(())
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assess_accepts_negative_coordinates_and_readings() {
        let cli = Cli::try_parse_from([
            "hazend", "assess", "--lat", "34.05", "--lon", "-118.25", "--temperature", "42",
            "--humidity", "15", "--start", "2024-07-01",
        ])
        .unwrap();

        match cli.command {
            Command::Assess { lat, lon, start, end, readings } => {
                assert_eq!(lat, 34.05);
                assert_eq!(lon, -118.25);
                assert_eq!(start, NaiveDate::from_ymd_opt(2024, 7, 1));
                assert_eq!(end, None);

                let readings = AmbientReadings::from(readings);
                assert_eq!(readings.temperature, Some(42.0));
                assert_eq!(readings.humidity, Some(15.0));
                assert_eq!(readings.windspeed, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn assess_defaults_coordinates_to_zero() {
        let cli = Cli::try_parse_from(["hazend", "assess"]).unwrap();
        assert!(matches!(cli.command, Command::Assess { lat, lon, .. } if lat == 0.0 && lon == 0.0));
    }

    #[test]
    fn serve_address_is_optional() {
        let cli = Cli::try_parse_from(["hazend", "serve"]).unwrap();
        assert!(matches!(cli.command, Command::Serve { address: None }));
    }

    #[test]
    fn non_empty_trims_and_drops_blank() {
        assert_eq!(non_empty("  ".into()), None);
        assert_eq!(non_empty(" key ".into()), Some("key".into()));
    }
}
