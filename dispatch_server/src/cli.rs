use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
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
    // VDS_AUTH_SECRET and VDS_REDIS_URL (which may embed a password) are deliberately left off this list
    const DISPLAY_ENVS: [&str; 12] = [
        "RUST_LOG",
        "VDS_HOST",
        "VDS_PORT",
        "VDS_WS_PORT",
        "VDS_DATABASE_URL",
        "VDS_LOCK_TTL",
        "VDS_LOCK_PREFIX",
        "VDS_SEARCH_RADIUS_KM",
        "VDS_MAX_CANDIDATES",
        "VDS_OFFER_TIMEOUT",
        "VDS_EXPIRY_SWEEP_INTERVAL",
        "VDS_USE_X_FORWARDED_FOR",
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
