//! Connect to a Cisco IOS device, run a few commands and apply a small
//! configuration change.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example show_version -- --host 192.168.1.1 --user admin --password secret
//! ```
//!
//! Pass `--secret` when `enable` asks for a password and `--profile` for
//! another registered profile (`clisync::ProfileRegistry` lists them).

use std::env;
use std::time::Duration;

use clisync::{AuthMethod, ConfigSetOptions, Mode, SessionBuilder, SshConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set RUST_LOG=debug (or trace for raw channel data) for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut ssh = SshConfig::new(&args.host, &args.user, AuthMethod::password(&args.password));
    ssh.port = args.port;

    println!("Connecting to {}:{} ({})...", args.host, args.port, args.profile);
    let mut builder = SessionBuilder::new()
        .profile(&args.profile)
        .timeout(Duration::from_secs(20));
    if let Some(secret) = &args.secret {
        builder = builder.secret(secret);
    }

    let mut session = builder.connect_ssh(&ssh).await?;
    session.open().await?;
    println!(
        "Connected: base prompt {:?}, {} mode",
        session.base_prompt().unwrap_or_default(),
        session.mode()
    );

    session.enter_mode(Mode::Privileged).await?;

    for command in ["show version", "show ip interface brief"] {
        let response = session.send_command(command).await?;
        println!("\n### {} ({:?})", command, response.elapsed);
        if let Some(failure) = &response.failure_message {
            eprintln!("device rejected {:?}: {}", command, failure);
        } else {
            println!("{}", response.result);
        }
    }

    let response = session
        .send_config_set(
            &["interface Loopback100", "description managed by clisync"],
            &ConfigSetOptions::new().error_pattern("% Invalid"),
        )
        .await?;
    println!("\n### config\n{}", response.result);

    let response = session.save_config().await?;
    println!("\n### save\n{}", response.result);

    session.close().await?;
    Ok(())
}

/// Minimal argument parsing.
struct Args {
    host: String,
    port: u16,
    user: String,
    password: String,
    secret: Option<String>,
    profile: String,
}

impl Args {
    fn parse() -> Self {
        let mut args = Args {
            host: "localhost".to_string(),
            port: 22,
            user: env::var("USER").unwrap_or_else(|_| "admin".to_string()),
            password: String::new(),
            secret: None,
            profile: "cisco_ios".to_string(),
        };

        let mut iter = env::args().skip(1);
        while let Some(flag) = iter.next() {
            let value = iter.next().unwrap_or_default();
            match flag.as_str() {
                "--host" => args.host = value,
                "--port" => args.port = value.parse().unwrap_or(22),
                "--user" => args.user = value,
                "--password" => args.password = value,
                "--secret" => args.secret = Some(value),
                "--profile" => args.profile = value,
                other => eprintln!("Unknown argument: {}", other),
            }
        }
        args
    }
}
