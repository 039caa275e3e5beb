use crate::commands::bootstrap::BootstrapSummary;

pub(crate) fn print_bootstrap_summary(summary: &BootstrapSummary) {
    println!("Vault bootstrap summary");
    println!("- endpoint: {}", summary.endpoint);
    if summary.initialized_now {
        println!(
            "- init: completed (shares={}, threshold={})",
            summary.key_shares, summary.key_threshold
        );
    } else {
        println!("- init: skipped (already initialized)");
    }

    match summary.root_token.as_deref() {
        Some(token) => println!(
            "- root token: {}",
            display_secret(token, summary.show_secrets)
        ),
        None => println!("- root token: not available"),
    }
    for (idx, key) in summary.unseal_keys.iter().enumerate() {
        println!(
            "- unseal key {}: {}",
            idx + 1,
            display_secret(key, summary.show_secrets)
        );
    }

    match &summary.base_config {
        Some(report) => {
            println!("- secrets engines:");
            for mount in &report.mounts {
                println!("  - {mount}");
            }
            if let Some(path) = report.escrow_path.as_deref() {
                println!("- unseal keys stored at: {path}");
            }
        }
        None => println!("- base configuration: skipped"),
    }

    if summary.initialized_now && summary.show_secrets {
        println!("Store the root token and unseal keys now; they are not shown again.");
    }
}

pub(crate) fn print_plan(lines: &[String]) {
    println!("Calls a fresh bootstrap would make:");
    for (idx, line) in lines.iter().enumerate() {
        println!("{}. {line}", idx + 1);
    }
}

pub(crate) fn display_secret(value: &str, show_secrets: bool) -> String {
    if show_secrets {
        value.to_string()
    } else {
        mask_value(value)
    }
}

pub(crate) fn mask_value(value: &str) -> String {
    let trimmed = value.trim();
    let count = trimmed.chars().count();
    if count <= 4 {
        "****".to_string()
    } else {
        let tail: String = trimmed.chars().skip(count - 4).collect();
        format!("****{tail}")
    }
}
