// merakictl - CLI for the Meraki Dashboard API
// Copyright (C) 2024 Mathias Uhl <mathiasuhl@gmx.de>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use std::thread;
use std::time::Duration;
use tracing::trace;

/// Sleep `interval`, then refresh, until `done` holds. Fixed interval, no
/// deadline.
pub fn poll_until<T, E, F, D>(
    mut current: T,
    interval: Duration,
    mut refresh: F,
    done: D,
) -> Result<T, E>
where
    F: FnMut(&T) -> Result<T, E>,
    D: Fn(&T) -> bool,
{
    let mut rounds = 0u32;
    while !done(&current) {
        thread::sleep(interval);
        current = refresh(&current)?;
        rounds += 1;
        trace!(rounds, "polled");
    }
    Ok(current)
}
