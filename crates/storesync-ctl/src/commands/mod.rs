/*
 *  Copyright 2025 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Command implementations.

pub mod purge;
pub mod rates;
pub mod status;
pub mod tasks;

use anyhow::{anyhow, Context, Result};
use chrono::Duration;

/// Parse a duration string like "30d", "24h", "1h30m" into a chrono::Duration.
///
/// Supported units: `d` (days), `h` (hours), `m` (minutes), `s` (seconds).
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim().to_lowercase();
    if s.is_empty() {
        return Err(anyhow!("Duration string cannot be empty"));
    }

    let mut total = Duration::zero();
    let mut current_num = String::new();

    for c in s.chars() {
        if c.is_ascii_digit() {
            current_num.push(c);
        } else {
            if current_num.is_empty() {
                return Err(anyhow!(
                    "Invalid duration format: expected number before '{}'",
                    c
                ));
            }

            let num: i64 = current_num
                .parse()
                .with_context(|| format!("Invalid number in duration: {}", current_num))?;
            current_num.clear();

            let duration = match c {
                'd' => Duration::days(num),
                'h' => Duration::hours(num),
                'm' => Duration::minutes(num),
                's' => Duration::seconds(num),
                _ => return Err(anyhow!("Unknown duration unit: '{}'. Use d, h, m, or s", c)),
            };

            total = total + duration;
        }
    }

    if !current_num.is_empty() {
        return Err(anyhow!(
            "Duration '{}' is missing a unit. Use d (days), h (hours), m (minutes), or s (seconds)",
            s
        ));
    }

    if total == Duration::zero() {
        return Err(anyhow!("Duration must be greater than zero"));
    }

    Ok(total)
}
