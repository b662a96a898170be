use std::env;
use std::path::{Path, PathBuf};

use tracklog_core::config::{
    normalize_base_url, SpotifyCredentials, SpotifyEndpoints, ENV_ACCESS_TOKEN, ENV_CLIENT_SECRET,
    ENV_REFRESH_TOKEN,
};

use crate::cli::ConfigCommands;
use crate::commands::common::{resolve_credentials, resolve_db_path};
use crate::config_profiles::{normalize_text_option, CliProfilesConfig};
use crate::error::CliError;

pub fn run_config(
    command: ConfigCommands,
    global_profile: Option<&str>,
    cli_db_path: Option<PathBuf>,
    config_path: &Path,
) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            profile,
            client_id,
            api_base_url,
            accounts_url,
            no_activate,
        } => {
            let profile_name = run_config_init(
                config_path,
                profile.as_deref().or(global_profile),
                client_id,
                api_base_url,
                accounts_url,
                no_activate,
            )?;
            println!(
                "Profile '{}' initialized at {}",
                profile_name,
                config_path.display()
            );
            Ok(())
        }
        ConfigCommands::Show => {
            for line in config_show_lines(config_path, global_profile, cli_db_path)? {
                println!("{line}");
            }
            Ok(())
        }
    }
}

/// Merge explicit values over the stored profile and save; returns the profile name
pub fn run_config_init(
    config_path: &Path,
    profile_name: Option<&str>,
    client_id: Option<String>,
    api_base_url: Option<String>,
    accounts_url: Option<String>,
    no_activate: bool,
) -> Result<String, CliError> {
    let mut config = CliProfilesConfig::load_from_path(config_path).map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);

    let api_base_url = normalize_text_option(api_base_url)
        .map(|url| validate_url("api_base_url", url))
        .transpose()?;
    let accounts_url = normalize_text_option(accounts_url)
        .map(|url| validate_url("accounts_url", url))
        .transpose()?;

    let profile = config.profile_mut_or_default(&profile_name);
    if let Some(value) = normalize_text_option(client_id) {
        profile.spotify_client_id = Some(value);
    }
    if let Some(value) = api_base_url {
        profile.api_base_url = Some(value);
    }
    if let Some(value) = accounts_url {
        profile.accounts_url = Some(value);
    }

    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }

    config.save_to_path(config_path).map_err(CliError::Config)?;
    Ok(profile_name)
}

fn validate_url(field: &str, url: String) -> Result<String, CliError> {
    normalize_base_url(url).map_err(|error| CliError::Config(format!("{field}: {error}")))
}

/// Resolved settings for display; secrets are reported by presence only
pub fn config_show_lines(
    config_path: &Path,
    explicit_profile: Option<&str>,
    cli_db_path: Option<PathBuf>,
) -> Result<Vec<String>, CliError> {
    let config = CliProfilesConfig::load_from_path(config_path).map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(explicit_profile);
    let profile = config.profile(&profile_name).cloned().unwrap_or_default();
    let endpoints = SpotifyEndpoints::resolve(
        profile.api_base_url.clone(),
        profile.accounts_url.clone(),
    )?;
    let db_path = resolve_db_path(cli_db_path, &profile_name)?;

    let credential_source = match resolve_credentials(|key| env::var(key).ok(), &profile) {
        Ok(SpotifyCredentials::AccessToken(_)) => ENV_ACCESS_TOKEN.to_string(),
        Ok(SpotifyCredentials::RefreshToken { .. }) => {
            format!("{ENV_REFRESH_TOKEN} + {ENV_CLIENT_SECRET}")
        }
        Err(_) => "missing".to_string(),
    };

    Ok(vec![
        format!("config:        {}", config_path.display()),
        format!("profile:       {profile_name}"),
        format!(
            "client id:     {}",
            profile.spotify_client_id.as_deref().unwrap_or("-")
        ),
        format!("api base url:  {}", endpoints.api_base_url),
        format!("accounts url:  {}", endpoints.accounts_url),
        format!("database:      {}", db_path.display()),
        format!("credentials:   {credential_source}"),
    ])
}
