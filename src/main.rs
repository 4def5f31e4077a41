// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use clap::Parser;
use log::error;

use oskar::Oskar;

fn main() {
    // Run oskar, only performing extra steps if it returns an error.
    if let Err(e) = Oskar::parse().run() {
        let code = e.code();
        // The logger may not have been set up, so print to stderr too.
        error!("{e}");
        eprintln!("oskar failed with status {} ({code}): {e}", code.code());
        std::process::exit(code.code());
    }
}
