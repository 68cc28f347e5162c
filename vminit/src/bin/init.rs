//! Guest `/init`.

use std::path::Path;
use vminit::constants::paths;
use vminit::network::NetlinkBackend;
use vminit::process::HostLauncher;
use vminit::world::LiveWorld;
use vminit::{BootSequencer, request_reboot};
use vminit_shared::decode_machine;

fn main() {
    vminit::logging::init();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "vminit starting");

    let config = match decode_machine(Path::new(paths::CONFIG_PATH)) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(
                error = %e,
                path = paths::CONFIG_PATH,
                "Failed to load machine configuration"
            );
            let mut world = LiveWorld::new();
            if let Err(e) = request_reboot(&mut world) {
                tracing::error!(error = %e, "Reboot request failed");
            }
            std::process::exit(1);
        }
    };

    let mut sequencer =
        BootSequencer::new(LiveWorld::new(), NetlinkBackend::new(), HostLauncher::new());
    let report = sequencer.run(&config);

    // Only reached when the reboot itself failed. Exiting PID 1 panics the
    // kernel, which restarts the guest.
    if let Err(e) = report.reboot {
        tracing::error!(error = %e, "Reboot request failed");
    }
    std::process::exit(1);
}
