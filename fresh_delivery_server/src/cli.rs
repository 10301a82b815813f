use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Only list variables that never hold secrets
    const DISPLAY_ENVS: [&str; 13] = [
        "RUST_LOG",
        "FDG_HOST",
        "FDG_PORT",
        "FDG_DATABASE_URL",
        "FDG_STANDARD_DELIVERY_FEE",
        "FDG_EXPEDITED_DELIVERY_FEE",
        "FDG_GATEWAY_APP_ID",
        "FDG_GATEWAY_MERCHANT_ID",
        "FDG_GATEWAY_NOTIFY_URL",
        "FDG_GATEWAY_HMAC_CHECKS",
        "FDG_GATEWAY_IP_WHITELIST",
        "FDG_USE_X_FORWARDED_FOR",
        "FDG_USE_FORWARDED",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
