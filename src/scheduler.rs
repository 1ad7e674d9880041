//! Proactive session renewal.
//!
//! Each indexer gets a random slot inside the configured daily window so
//! many sites never log in at the same instant, and a sub-minute poll fires
//! `force_refresh` once per day per enabled site when its slot passes. A
//! failed renewal is logged and left alone; the next on-demand
//! `ensure_session` retries naturally.

use actix_web::web;
use chrono::{Duration as ChronoDuration, Local, NaiveDate, NaiveTime};
use rand::Rng;
use std::collections::HashMap;

use crate::app_state::AppState;

pub fn spawn(data: web::Data<AppState>) {
    actix_web::rt::spawn(async move {
        let poll = std::time::Duration::from_secs(data.config.session.poll_interval_secs);
        let window_start = parse_window_start(&data.config.session.renewal_window_start);
        let window_minutes = data.config.session.renewal_window_minutes.max(1);

        let mut slots: HashMap<String, NaiveTime> = HashMap::new();
        let mut renewed_on: HashMap<String, NaiveDate> = HashMap::new();

        log::info!(
            "Session scheduler started (window {} + {}min, poll {}s)",
            window_start,
            window_minutes,
            poll.as_secs()
        );

        loop {
            actix_web::rt::time::sleep(poll).await;

            let now = Local::now();
            let today = now.date_naive();

            for profile in data.registry.all() {
                let slot = *slots.entry(profile.id.clone()).or_insert_with(|| {
                    let slot = random_slot(window_start, window_minutes);
                    log::info!("Scheduled {} session renewal at {}", profile.id, slot);
                    // A slot already in the past on startup would fire
                    // immediately; treat it as missed for today instead.
                    if now.time() >= slot {
                        renewed_on.insert(profile.id.clone(), today);
                    }
                    slot
                });

                if now.time() < slot || renewed_on.get(&profile.id) == Some(&today) {
                    continue;
                }

                if !profile.enabled {
                    log::debug!("Skipping renewal for disabled indexer {}", profile.id);
                    renewed_on.insert(profile.id.clone(), today);
                    continue;
                }

                log::info!("Auto-renewing session for {}", profile.id);
                match data.sessions.force_refresh(&profile).await {
                    Ok(_) => {
                        data.metrics.record_renewal(&profile.id);
                        log::info!("Renewed session for {}", profile.id);
                        renewed_on.insert(profile.id.clone(), today);
                    }
                    Err(e) => {
                        // Non-fatal: the next on-demand ensure_session
                        // retries; the slot fires again tomorrow.
                        log::error!("Failed to renew session for {}: {}", profile.id, e);
                        renewed_on.insert(profile.id.clone(), today);
                    }
                }
            }
        }
    });
}

fn parse_window_start(start: &str) -> NaiveTime {
    NaiveTime::parse_from_str(start, "%H:%M").unwrap_or_else(|_| {
        log::error!("Invalid renewal_window_start {:?}, using 08:00", start);
        NaiveTime::from_hms_opt(8, 0, 0).unwrap()
    })
}

fn random_slot(start: NaiveTime, window_minutes: u32) -> NaiveTime {
    let offset = {
        let mut rng = rand::thread_rng();
        rng.gen_range(0..u64::from(window_minutes) * 60)
    };
    start + ChronoDuration::seconds(offset as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_land_inside_the_window() {
        let start = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
        for _ in 0..50 {
            let slot = random_slot(start, 60);
            assert!(slot >= start);
            assert!(slot < NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        }
    }

    #[test]
    fn window_start_parsing() {
        assert_eq!(
            parse_window_start("06:30"),
            NaiveTime::from_hms_opt(6, 30, 0).unwrap()
        );
        assert_eq!(
            parse_window_start("garbage"),
            NaiveTime::from_hms_opt(8, 0, 0).unwrap()
        );
    }
}
