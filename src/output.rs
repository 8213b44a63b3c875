//! CLI output formatting for catalog commands.
//!
//! # Information-First Display
//!
//! Every entity leads with a positional index and its human name; slugs,
//! payload paths and timestamps follow as indented context lines:
//!
//! ```text
//! 001 Audi (2 models)
//!     001 A4
//!     002 Q7
//! 002 BMW (1 model)
//!     001 X5
//! ```
//!
//! ```text
//! #3 Audi A4 2.0 TDI [published]
//!     Slug: audi-a4-3
//!     Price: 25000 BYN
//!     Status changed: 2024-05-01 12:00
//!     Published: 2024-05-01 12:00
//!     Photos:
//!         001 cars/2024/05/01/front-3f9a1c2b.jpg (primary)
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure.

use crate::imaging::NormalisedImage;
use crate::types::{Car, CarImage, CarModel, Make, PublicationLog};
use chrono::{DateTime, Utc};

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

fn plural(n: usize, one: &str, many: &str) -> String {
    format!("{} {}", n, if n == 1 { one } else { many })
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate_desc(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Makes with their models nested underneath.
pub fn format_makes(makes: &[Make], models: &[CarModel]) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, make) in makes.iter().enumerate() {
        let own: Vec<&CarModel> = models.iter().filter(|m| m.make == make.id).collect();
        lines.push(format!(
            "{} {} ({})",
            format_index(i + 1),
            make.title,
            plural(own.len(), "model", "models")
        ));
        for (j, model) in own.iter().enumerate() {
            lines.push(format!("{}{} {}", indent(1), format_index(j + 1), model.title));
        }
    }
    lines
}

pub fn print_makes(makes: &[Make], models: &[CarModel]) {
    for line in format_makes(makes, models) {
        println!("{}", line);
    }
}

/// One line per car.
pub fn format_car_list(cars: &[Car]) -> Vec<String> {
    if cars.is_empty() {
        return vec!["No cars".to_string()];
    }
    cars.iter()
        .map(|car| {
            format!(
                "#{} {} [{}] {} {}",
                car.id,
                car.attributes.title,
                car.status(),
                car.attributes.price,
                car.attributes.currency
            )
        })
        .collect()
}

pub fn print_car_list(cars: &[Car]) {
    for line in format_car_list(cars) {
        println!("{}", line);
    }
}

/// Full view of a single car with its photos.
pub fn format_car_details(car: &Car, images: &[CarImage]) -> Vec<String> {
    let attrs = &car.attributes;
    let mut lines = vec![
        format!("#{} {} [{}]", car.id, attrs.title, car.status()),
        format!("{}Slug: {}", indent(1), car.slug),
        format!("{}Year: {}", indent(1), attrs.manufacture_year),
        format!("{}Price: {} {}", indent(1), attrs.price, attrs.currency),
    ];
    if !attrs.vin.is_empty() {
        lines.push(format!("{}VIN: {}", indent(1), attrs.vin));
    }
    if attrs.mileage_km > 0 {
        lines.push(format!("{}Mileage: {} km", indent(1), attrs.mileage_km));
    }
    if !attrs.description.trim().is_empty() {
        lines.push(format!(
            "{}{}",
            indent(1),
            truncate_desc(attrs.description.trim(), 60)
        ));
    }
    lines.push(format!(
        "{}Status changed: {}",
        indent(1),
        timestamp(car.status_changed_at)
    ));
    if let Some(published_at) = car.published_at {
        lines.push(format!("{}Published: {}", indent(1), timestamp(published_at)));
    }
    if !images.is_empty() {
        lines.push(format!("{}Photos:", indent(1)));
        for (i, image) in images.iter().enumerate() {
            let marker = if image.is_primary { " (primary)" } else { "" };
            lines.push(format!(
                "{}{} {}{}",
                indent(2),
                format_index(i + 1),
                image.payload,
                marker
            ));
        }
    }
    lines
}

pub fn print_car_details(car: &Car, images: &[CarImage]) {
    for line in format_car_details(car, images) {
        println!("{}", line);
    }
}

/// `source → output (WxH)` per normalised file.
pub fn format_normalised(results: &[(String, NormalisedImage)]) -> Vec<String> {
    results
        .iter()
        .map(|(source, image)| {
            format!(
                "{} \u{2192} {} ({}x{})",
                source, image.file_name, image.width, image.height
            )
        })
        .collect()
}

pub fn print_normalised(results: &[(String, NormalisedImage)]) {
    for line in format_normalised(results) {
        println!("{}", line);
    }
}

/// Publication log entries, newest first as given.
pub fn format_publication_logs(logs: &[PublicationLog]) -> Vec<String> {
    let mut lines = Vec::new();
    for log in logs {
        let external = if log.external_id.is_empty() {
            String::new()
        } else {
            format!(" ({})", log.external_id)
        };
        lines.push(format!(
            "{} car #{} on channel #{}: {}{}",
            timestamp(log.created_at),
            log.car,
            log.channel,
            log.status,
            external
        ));
        if !log.error_message.is_empty() {
            lines.push(format!("{}Error: {}", indent(1), log.error_message));
        }
    }
    lines
}

pub fn print_publication_logs(logs: &[PublicationLog]) {
    for line in format_publication_logs(logs) {
        println!("{}", line);
    }
}
