use vault_bootstrap::Settings;
use vault_bootstrap::config::InitSourceKind;
use vault_bootstrap::operator::OperatorTarget;

use crate::cli::output::print_plan;

pub(crate) fn run_plan(settings: &Settings) {
    print_plan(&plan_lines(settings));
}

/// One line per external call a fresh bootstrap issues, shares redacted.
fn plan_lines(settings: &Settings) -> Vec<String> {
    let target = OperatorTarget::from_settings(&settings.server);
    let prefix = settings
        .remote
        .as_ref()
        .map(|remote| format!("ssh -p {} {}@{} -- ", remote.port, remote.user, remote.host))
        .unwrap_or_default();
    let shares = settings.init.key_shares;
    let threshold = settings.init.key_threshold;

    let mut lines = vec![format!(
        "GET {}/v1/sys/seal-status",
        settings.server.endpoint
    )];
    let mut commands = target.plan(shares, threshold).into_iter();
    let init = commands.next();
    match settings.init.source {
        InitSourceKind::Logs => {
            lines.extend(init.map(|spec| format!("{prefix}{}", spec.display_redacted())));
        }
        InitSourceKind::Api => lines.push(format!(
            "POST {}/v1/sys/init (secret_shares={shares}, secret_threshold={threshold})",
            settings.server.endpoint
        )),
    }
    lines.extend(commands.map(|spec| format!("{prefix}{}", spec.display_redacted())));
    lines.push(format!(
        "GET {}/v1/sys/health (up to {} attempts)",
        settings.server.endpoint, settings.health.max_attempts
    ));
    lines
}
