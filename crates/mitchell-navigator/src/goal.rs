//! Parses a free-text vehicle description into a [`VehicleGoal`].
//!
//! Mirrors the reference navigator's `_parse_goal`: a handful of
//! best-effort regexes plus a fixed canonical make list, not a general NLP
//! pipeline. Order of extraction matters — model extraction depends on the
//! make, engine, body style, and drive type having already been pulled out
//! so their tokens aren't mistaken for the model.

use std::sync::OnceLock;

use mitchell_types::VehicleGoal;
use regex::Regex;

/// Canonical makes this portal recognizes, matched case-insensitively as
/// whole words. Order doesn't matter; `alias_to_canonical` handles the
/// informal spellings that don't literally appear here (`chevy`, `vw`, ...).
const CANONICAL_MAKES: &[&str] = &[
    "Ford",
    "Chevrolet",
    "Toyota",
    "Honda",
    "Nissan",
    "Dodge",
    "Ram",
    "Jeep",
    "GMC",
    "BMW",
    "Mercedes-Benz",
    "Audi",
    "Volkswagen",
    "Hyundai",
    "Kia",
    "Mazda",
    "Subaru",
    "Lexus",
    "Acura",
    "Infiniti",
    "Cadillac",
    "Buick",
    "Lincoln",
    "Chrysler",
    "Porsche",
    "Volvo",
    "Tesla",
    "Mitsubishi",
];

/// Maps a common alias or abbreviation to the portal's canonical make name.
/// Applied before searching the goal text for a make match, so `"chevy"` in
/// the goal resolves to `"Chevrolet"`.
fn alias_to_canonical(word: &str) -> Option<&'static str> {
    match word.to_ascii_lowercase().as_str() {
        "chevy" => Some("Chevrolet"),
        "vw" => Some("Volkswagen"),
        "mercedes" | "merc" | "benz" => Some("Mercedes-Benz"),
        _ => None,
    }
}

fn year_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(19\d{2}|20\d{2})\b").unwrap())
}

fn drive_type_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(4WD|AWD|RWD|FWD|2WD|4x4)\b").unwrap())
}

fn body_style_res() -> &'static [Regex] {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        vec![
            Regex::new(
                r"(?i)(\d+D\s+(?:Pickup|Sedan|Hatchback|Coupe|SUV|Wagon|Van|Cab)(?:\s+(?:Crew|Extended|Double|Regular|Extra)\s+Cab)?)",
            )
            .unwrap(),
            Regex::new(r"(?i)((?:Crew|Extended|Double|Regular|Extra)\s+Cab)").unwrap(),
            Regex::new(r"(?i)(\d+\s*[Dd]oor)").unwrap(),
        ]
    })
}

fn engine_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d+\.\d+)L?\b(?:\s*(V\d+))?").unwrap())
}

/// Extracts the first 4-digit year in `1900..=2099`.
fn extract_year(goal: &str) -> Option<u16> {
    year_re()
        .captures(goal)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Finds the first canonical make mentioned in `goal` (after alias
/// resolution of every whitespace-separated token), matched as a whole word.
fn extract_make(goal: &str) -> Option<&'static str> {
    for token in goal.split_whitespace() {
        let cleaned = token.trim_matches(|c: char| !c.is_alphanumeric());
        if let Some(canonical) = alias_to_canonical(cleaned) {
            return Some(canonical);
        }
    }
    for make in CANONICAL_MAKES {
        let pattern = format!(r"(?i)\b{}\b", regex::escape(make));
        if Regex::new(&pattern).unwrap().is_match(goal) {
            return Some(make);
        }
    }
    None
}

fn extract_drive_type(goal: &str) -> Option<String> {
    drive_type_re()
        .captures(goal)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_ascii_uppercase())
}

fn extract_body_style(goal: &str) -> Option<String> {
    body_style_res()
        .iter()
        .find_map(|re| re.captures(goal).and_then(|c| c.get(1)).map(|m| m.as_str().to_string()))
}

fn extract_engine(goal: &str) -> Option<String> {
    engine_re().captures(goal).and_then(|c| c.get(1)).map(|m| {
        let displacement = m.as_str();
        if displacement.ends_with('L') {
            displacement.to_string()
        } else {
            format!("{displacement}L")
        }
    })
}

/// Extracts the model (first token after the make) and, if any tokens
/// remain once the engine/body-style/drive-type substrings are stripped
/// out, a candidate submodel from the rest.
fn extract_model_and_submodel(
    goal: &str,
    make: &str,
    engine: Option<&str>,
    body_style: Option<&str>,
    drive_type: Option<&str>,
) -> (Option<String>, Option<String>) {
    let make_pattern = format!(r"(?i)\b{}\s+(.+)", regex::escape(make));
    let Some(rest_match) = Regex::new(&make_pattern).unwrap().captures(goal) else {
        return (None, None);
    };
    let mut rest = rest_match.get(1).unwrap().as_str().to_string();

    for suffix in [engine, body_style, drive_type].into_iter().flatten() {
        if suffix.is_empty() {
            continue;
        }
        let pattern = format!(r"(?i)\s*\b{}\b\s*", regex::escape(suffix));
        if let Ok(re) = Regex::new(&pattern) {
            rest = re.replace_all(&rest, " ").to_string();
        }
    }

    let tokens: Vec<&str> = rest.split_whitespace().collect();
    if tokens.is_empty() {
        return (None, None);
    }

    let model = tokens[0].to_string();
    let submodel = if tokens.len() > 1 {
        Some(tokens[1..].join(" "))
    } else {
        None
    };
    (Some(model), submodel)
}

/// Parses `goal` into a [`VehicleGoal`]. Year, make, and model are left
/// unset (`year: 0`, empty strings) when they cannot be extracted —
/// callers (the Navigator) are responsible for treating those as the
/// "required field missing" failure case, not this function.
pub fn parse(goal: &str) -> VehicleGoal {
    let year = extract_year(goal).unwrap_or(0);
    let make = extract_make(goal);
    let drive_type = extract_drive_type(goal);
    let body_style = extract_body_style(goal);
    let engine = extract_engine(goal);

    let (model, submodel) = match make {
        Some(make) => extract_model_and_submodel(
            goal,
            make,
            engine.as_deref(),
            body_style.as_deref(),
            drive_type.as_deref(),
        ),
        None => (None, None),
    };

    VehicleGoal {
        year,
        make: make.unwrap_or_default().to_string(),
        model: model.unwrap_or_default(),
        engine,
        submodel,
        body_style,
        drive_type,
        raw: goal.to_string(),
    }
}

/// Joins the non-empty fields of a [`VehicleGoal`] in the canonical order
/// `year make model engine submodel body_style drive_type`, matching the
/// order the Request Handler builds a goal string from a `VehicleSpec`.
///
/// Round-tripping this through [`parse`] again reproduces the same
/// `VehicleGoal` (modulo `raw`, which always reflects the most recent
/// parse) — this is the join half of the parse/join idempotence property.
pub fn join(goal: &VehicleGoal) -> String {
    let mut parts = vec![goal.year.to_string(), goal.make.clone(), goal.model.clone()];
    for field in [&goal.engine, &goal.submodel, &goal.body_style, &goal.drive_type] {
        if let Some(value) = field
            && !value.is_empty()
        {
            parts.push(value.clone());
        }
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_goal() {
        let goal = parse("2018 Ford F-150 5.0L XLT 2D Pickup 4WD");
        assert_eq!(goal.year, 2018);
        assert_eq!(goal.make, "Ford");
        assert_eq!(goal.model, "F-150");
        assert_eq!(goal.engine.as_deref(), Some("5.0L"));
        assert_eq!(goal.drive_type.as_deref(), Some("4WD"));
        assert_eq!(goal.body_style.as_deref(), Some("2D Pickup"));
    }

    #[test]
    fn resolves_make_aliases() {
        let goal = parse("2015 Chevy Silverado");
        assert_eq!(goal.make, "Chevrolet");

        let goal = parse("2020 VW Jetta");
        assert_eq!(goal.make, "Volkswagen");
    }

    #[test]
    fn missing_required_fields_are_left_empty() {
        let goal = parse("a vehicle of some kind");
        assert_eq!(goal.year, 0);
        assert!(goal.make.is_empty());
        assert!(goal.model.is_empty());
    }

    #[test]
    fn drive_type_recognizes_4x4_case_insensitively() {
        let goal = parse("2012 Toyota Tacoma 4x4");
        assert_eq!(goal.drive_type.as_deref(), Some("4X4"));
    }

    #[test]
    fn join_then_parse_round_trips_core_fields() {
        let original = parse("2018 Ford F-150 5.0L XLT 2D Pickup 4WD");
        let joined = join(&original);
        let reparsed = parse(&joined);

        assert_eq!(reparsed.year, original.year);
        assert_eq!(reparsed.make, original.make);
        assert_eq!(reparsed.model, original.model);
        assert_eq!(reparsed.drive_type, original.drive_type);
    }

    #[test]
    fn submodel_captures_remaining_tokens_after_model() {
        let goal = parse("2021 Ford Bronco King Ranch");
        assert_eq!(goal.model, "Bronco");
        assert_eq!(goal.submodel.as_deref(), Some("King Ranch"));
    }
}
