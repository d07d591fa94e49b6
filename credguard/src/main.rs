//! Operator CLI. Configuration comes from the JSON file named by
//! `CREDGUARD_CONFIG` (default `credguard.json`).

use std::env;
use std::process::ExitCode;
use std::time::Duration;

use credguard::config::{load_config_or_default, RuntimeConfig};
use credguard::context::CallContext;
use credguard::crypto::passwords::{hash_password, verify_password, HashedPassword};
use credguard::logging::build_logger;
use credguard::numeric::{round_to_int32, to_int32};
use credguard::registrar::Registrar;
use credguard::repository::SqliteCredentialRepository;
use zeroize::Zeroizing;

/// Moves a plaintext argument into a `Zeroizing` buffer, leaving an empty
/// string behind so no unwiped copy stays in `args`.
fn take_secret(args: &mut [String], index: usize) -> Zeroizing<String> {
    Zeroizing::new(std::mem::take(&mut args[index]))
}

fn print_usage() -> ExitCode {
    eprintln!("Commands:\n  register <email> <password>\n  to-int32 <integer>\n  round-int32 <float>\n  hash-password <plaintext>\n  verify-password <plaintext> <argon2-hash>\n  show-config");
    ExitCode::from(2)
}

fn register(config: &RuntimeConfig, email: &str, password: &str) -> ExitCode {
    let repository = match SqliteCredentialRepository::open(&config.database_path) {
        Ok(repo) => repo,
        Err(err) => {
            eprintln!("cannot open credential store: {err}");
            return ExitCode::FAILURE;
        }
    };
    let registrar = Registrar::with_cost(repository, config.hash_cost);
    let ctx = CallContext::with_timeout(Duration::from_millis(config.backend_timeout_ms));
    match registrar.register(&ctx, email, password) {
        Ok(()) => {
            println!("registered");
            ExitCode::SUCCESS
        }
        Err(err) if err.is_duplicate() => {
            eprintln!("email taken");
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("registration failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn main() -> ExitCode {
    let mut args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        return print_usage();
    }

    let config_path = env::var("CREDGUARD_CONFIG").unwrap_or_else(|_| "credguard.json".to_string());
    let config = match load_config_or_default(&config_path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("config load failed: {err}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = build_logger(&config.logger).and_then(|logger| logger.install_global()) {
        eprintln!("logger setup failed: {err}");
        return ExitCode::FAILURE;
    }

    let command = args[1].clone();
    match command.as_str() {
        "register" => {
            if args.len() != 4 {
                return print_usage();
            }
            let password = take_secret(&mut args, 3);
            register(&config, &args[2], &password)
        }
        "to-int32" => {
            if args.len() != 3 {
                return print_usage();
            }
            let value: i64 = match args[2].parse() {
                Ok(value) => value,
                Err(err) => {
                    eprintln!("not an integer: {err}");
                    return ExitCode::FAILURE;
                }
            };
            match to_int32(value) {
                Ok(narrowed) => {
                    println!("{narrowed}");
                    ExitCode::SUCCESS
                }
                Err(err) => {
                    eprintln!("{err}");
                    ExitCode::FAILURE
                }
            }
        }
        "round-int32" => {
            if args.len() != 3 {
                return print_usage();
            }
            match args[2].parse::<f64>() {
                Ok(value) => {
                    println!("{}", round_to_int32(value));
                    ExitCode::SUCCESS
                }
                Err(err) => {
                    eprintln!("not a number: {err}");
                    ExitCode::FAILURE
                }
            }
        }
        "hash-password" => {
            if args.len() != 3 {
                return print_usage();
            }
            let password = take_secret(&mut args, 2);
            match hash_password(&password, &config.hash_cost) {
                Ok(hash) => {
                    println!("{}", hash.as_str());
                    ExitCode::SUCCESS
                }
                Err(err) => {
                    eprintln!("hashing failed: {err}");
                    ExitCode::FAILURE
                }
            }
        }
        "verify-password" => {
            if args.len() != 4 {
                return print_usage();
            }
            let password = take_secret(&mut args, 2);
            let stored = HashedPassword::from_phc(std::mem::take(&mut args[3]));
            let matches = verify_password(&password, &stored);
            println!("{}", if matches { "match" } else { "no-match" });
            ExitCode::SUCCESS
        }
        "show-config" => match serde_json::to_string_pretty(&config) {
            Ok(rendered) => {
                println!("{rendered}");
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("config render failed: {err}");
                ExitCode::FAILURE
            }
        },
        _ => print_usage(),
    }
}

#[cfg(test)]
mod tests {
    use super::take_secret;

    #[test]
    fn secret_argument_is_moved_out_of_args() {
        let mut args = vec![
            "credguard".to_string(),
            "hash-password".to_string(),
            "hunter2".to_string(),
        ];
        let secret = take_secret(&mut args, 2);
        assert_eq!(secret.as_str(), "hunter2");
        assert!(args[2].is_empty());
        assert_eq!(args[1], "hash-password");
    }
}
