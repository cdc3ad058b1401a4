//! Structured output with TextFSM templates.
//!
//! Runs against the in-memory device simulator, so no hardware is needed.
//! One template is registered with the parser by platform and command; the
//! other is passed per call as a file path.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example textfsm_parsing --features textfsm,testing
//! ```

use std::path::Path;
use std::sync::Arc;

use clisync::parse::TextFsmParser;
use clisync::testing::FakeDevice;
use clisync::{CommandOptions, Output, SessionBuilder};

const SHOW_VERSION: &str = "\
Cisco IOS Software, C2960 Software (C2960-LANBASEK9-M), Version 15.2(7)E4, RELEASE SOFTWARE (fc2)
Technical Support: http://www.cisco.com/techsupport

edge01 uptime is 12 weeks, 3 days, 4 hours, 10 minutes";

const SHOW_IP_INTERFACE_BRIEF: &str = "\
Interface              IP-Address      OK? Method Status                Protocol
Vlan1                  10.0.0.2        YES NVRAM  up                    up
GigabitEthernet0/1     unassigned      YES unset  down                  down
GigabitEthernet0/2     unassigned      YES unset  administratively down down";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let device = FakeDevice::new("edge01")
        .with_output("show version", SHOW_VERSION.replace('\n', "\r\n"))
        .with_output("show ip interface brief", SHOW_IP_INTERFACE_BRIEF.replace('\n', "\r\n"))
        .with_output("show clock", "*10:15:02.123 UTC Mon Oct 19 2026");

    let parser = TextFsmParser::new().with_template(
        "cisco_ios",
        "show version",
        include_str!("templates/cisco_ios_show_version.textfsm"),
    );

    let mut session = SessionBuilder::new()
        .profile("cisco_ios")
        .parser(Arc::new(parser))
        .build(device.into_transport())?;
    session.open().await?;

    let response = session
        .send_command_with("show version", &CommandOptions::new().parse())
        .await?;
    print_output("show version", response.output());

    let template = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("examples/templates/cisco_ios_show_ip_interface_brief.textfsm");
    let response = session
        .send_command_with("show ip interface brief", &CommandOptions::new().template(template))
        .await?;
    print_output("show ip interface brief", response.output());

    // No template for this one; the text comes back unchanged.
    let response = session
        .send_command_with("show clock", &CommandOptions::new().parse())
        .await?;
    print_output("show clock", response.output());

    session.close().await?;
    Ok(())
}

fn print_output(command: &str, output: Output<'_>) {
    println!("### {}", command);
    match output {
        Output::Structured(value) => match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("cannot render {}: {}", command, e),
        },
        Output::Text(text) => println!("(text)\n{}", text),
    }
    println!();
}
