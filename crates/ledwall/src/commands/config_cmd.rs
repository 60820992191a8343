//! Config subcommand handlers.

use ledwall_config::{Config, save_config_to};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, InitArgs, OutputFormat};
use crate::config;
use crate::error::CliError;
use crate::output;

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&config::config_path(global).display().to_string(), global.quiet);
            Ok(())
        }
        ConfigCommand::Show => show(global),
        ConfigCommand::Init(init_args) => init(global, &init_args),
        ConfigCommand::SetPin => set_pin(global),
    }
}

fn show(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let shown = config::redacted(&cfg);
    let format = config::output_format(global, &cfg);
    let out = match format {
        // TOML reads best for a config file
        OutputFormat::Table | OutputFormat::Plain => {
            toml::to_string_pretty(&shown).map_err(|e| CliError::Render {
                reason: e.to_string(),
            })?
        }
        other => output::render_single(other, &shown, |_| String::new(), |_| String::new())?,
    };
    output::print_output(out.trim_end(), global.quiet);
    Ok(())
}

/// Write a starter config, seeded from any `--transport/--port/--host`.
fn init(global: &GlobalOpts, args: &InitArgs) -> Result<(), CliError> {
    let path = config::config_path(global);
    if path.exists() && !args.force {
        return Err(CliError::ConfigExists {
            path: path.display().to_string(),
        });
    }

    let mut cfg = Config::default();
    if let Some(transport) = global.transport {
        cfg.device.transport = transport.into();
    }
    cfg.device.port.clone_from(&global.port);
    cfg.device.host.clone_from(&global.host);

    save_config_to(&cfg, &path)?;
    if !global.quiet {
        eprintln!("Wrote {}", path.display());
    }
    Ok(())
}

fn set_pin(global: &GlobalOpts) -> Result<(), CliError> {
    let prompt_err = |e: std::io::Error| CliError::Prompt {
        reason: e.to_string(),
    };
    let pin = rpassword::prompt_password("New admin pin: ").map_err(prompt_err)?;
    if pin.trim().is_empty() {
        return Err(CliError::Validation {
            field: "pin".into(),
            reason: "admin pin cannot be empty".into(),
        });
    }
    let confirm = rpassword::prompt_password("Repeat admin pin: ").map_err(prompt_err)?;
    if pin != confirm {
        return Err(CliError::Validation {
            field: "pin".into(),
            reason: "pins do not match".into(),
        });
    }

    ledwall_config::store_admin_pin(&pin)?;
    if !global.quiet {
        eprintln!("Admin pin stored in system keyring");
    }
    Ok(())
}
