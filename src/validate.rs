//! Input validation and enum normalization.
//!
//! Provides O(1) validation sets and synonym maps so people can type
//! statuses, priorities and roles the way they say them. Three-tier
//! resolution: exact match → synonym lookup → error with suggestion.
//!
//! Also holds the checks on issue drafts and patches that the
//! lifecycle engine runs before touching storage.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use crate::error::{Error, Result};
use crate::model::{IssueDraft, IssuePatch, IssuePriority, IssueStatus, Role};

pub const MAX_TITLE_LEN: usize = 120;
pub const MAX_DESCRIPTION_LEN: usize = 2000;
pub const MAX_ADDRESS_LEN: usize = 255;
pub const MAX_NAME_LEN: usize = 120;

// ── Valid value sets (O(1) lookups) ──────────────────────────

pub static VALID_STATUSES: LazyLock<HashSet<&str>> = LazyLock::new(|| {
    ["open", "assigned", "in_progress", "resolved", "closed"]
        .into_iter()
        .collect()
});

pub static VALID_PRIORITIES: LazyLock<HashSet<&str>> =
    LazyLock::new(|| ["low", "medium", "high"].into_iter().collect());

pub static VALID_ROLES: LazyLock<HashSet<&str>> =
    LazyLock::new(|| ["citizen", "dispatcher", "admin"].into_iter().collect());

// ── Synonym maps ─────────────────────────────────────────────

pub static STATUS_SYNONYMS: LazyLock<HashMap<&str, &str>> = LazyLock::new(|| {
    [
        ("new", "open"),
        ("reopen", "open"),
        ("reopened", "open"),
        ("todo", "open"),
        ("assign", "assigned"),
        ("dispatched", "assigned"),
        ("wip", "in_progress"),
        ("working", "in_progress"),
        ("started", "in_progress"),
        ("active", "in_progress"),
        ("done", "resolved"),
        ("fixed", "resolved"),
        ("complete", "resolved"),
        ("completed", "resolved"),
        ("close", "closed"),
        ("archived", "closed"),
        ("wontfix", "closed"),
    ]
    .into_iter()
    .collect()
});

pub static PRIORITY_SYNONYMS: LazyLock<HashMap<&str, &str>> = LazyLock::new(|| {
    [
        ("urgent", "high"),
        ("critical", "high"),
        ("important", "high"),
        ("normal", "medium"),
        ("default", "medium"),
        ("minor", "low"),
        ("trivial", "low"),
    ]
    .into_iter()
    .collect()
});

pub static ROLE_SYNONYMS: LazyLock<HashMap<&str, &str>> = LazyLock::new(|| {
    [
        ("resident", "citizen"),
        ("user", "citizen"),
        ("staff", "dispatcher"),
        ("operator", "dispatcher"),
        ("administrator", "admin"),
    ]
    .into_iter()
    .collect()
});

/// Normalize a status string via exact match or synonym lookup.
///
/// `in-progress` and `in progress` are accepted as `in_progress`.
///
/// # Errors
///
/// Returns `InvalidArgument` naming the input and the closest valid status, if any.
pub fn normalize_status(input: &str) -> Result<IssueStatus> {
    let canonical = resolve(input, &VALID_STATUSES, &STATUS_SYNONYMS)
        .map_err(|suggestion| invalid("status", input, suggestion))?;
    IssueStatus::parse(&canonical).ok_or_else(|| invalid("status", input, None))
}

/// Normalize a priority string via exact match or synonym lookup.
///
/// # Errors
///
/// Returns `InvalidArgument` naming the input and the closest valid priority, if any.
pub fn normalize_priority(input: &str) -> Result<IssuePriority> {
    let canonical = resolve(input, &VALID_PRIORITIES, &PRIORITY_SYNONYMS)
        .map_err(|suggestion| invalid("priority", input, suggestion))?;
    IssuePriority::parse(&canonical).ok_or_else(|| invalid("priority", input, None))
}

/// Normalize a role string via exact match or synonym lookup.
///
/// # Errors
///
/// Returns `InvalidArgument` naming the input and the closest valid role, if any.
pub fn normalize_role(input: &str) -> Result<Role> {
    let canonical = resolve(input, &VALID_ROLES, &ROLE_SYNONYMS)
        .map_err(|suggestion| invalid("role", input, suggestion))?;
    Role::parse(&canonical).ok_or_else(|| invalid("role", input, None))
}

/// Exact → synonym → closest suggestion.
fn resolve(
    input: &str,
    valid: &HashSet<&str>,
    synonyms: &HashMap<&str, &str>,
) -> std::result::Result<String, Option<String>> {
    let lower = input.trim().to_lowercase().replace(['-', ' '], "_");

    // Tier 1: exact match
    if valid.contains(lower.as_str()) {
        return Ok(lower);
    }

    // Tier 2: synonym lookup
    if let Some(&canonical) = synonyms.get(lower.as_str()) {
        return Ok(canonical.to_string());
    }

    // Tier 3: find closest suggestion
    Err(find_closest_match(&lower, valid, synonyms))
}

fn invalid(what: &str, input: &str, suggestion: Option<String>) -> Error {
    match suggestion {
        Some(s) => Error::InvalidArgument(format!("invalid {what} '{input}', did you mean '{s}'?")),
        None => Error::InvalidArgument(format!("invalid {what} '{input}'")),
    }
}

/// Find the closest matching value across valid set and synonyms.
fn find_closest_match(
    input: &str,
    valid: &HashSet<&str>,
    synonyms: &HashMap<&str, &str>,
) -> Option<String> {
    let mut best: Option<(&str, usize)> = None;

    for &v in valid.iter().chain(synonyms.keys()) {
        let dist = levenshtein_distance(input, v);
        if dist > 3 || best.is_some_and(|(_, d)| dist >= d) {
            continue;
        }
        // For synonyms, show what it maps to
        let target = synonyms.get(v).copied().unwrap_or(v);
        best = Some((target, dist));
    }

    best.map(|(v, _)| v.to_string())
}

// ── Levenshtein distance ─────────────────────────────────────

/// Compute the Levenshtein edit distance between two strings.
#[must_use]
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let a_len = a.len();
    let b_len = b.len();

    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    // Use single-row optimization (O(min(m,n)) space)
    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut curr = vec![0; b_len + 1];

    for i in 1..=a_len {
        curr[0] = i;
        for j in 1..=b_len {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1) // deletion
                .min(curr[j - 1] + 1) // insertion
                .min(prev[j - 1] + cost); // substitution
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_len]
}

// ── Issue input checks ───────────────────────────────────────

/// Check a draft before it becomes an issue.
///
/// # Errors
///
/// Returns `InvalidArgument` on the first rule the draft breaks.
pub fn validate_draft(draft: &IssueDraft) -> Result<()> {
    check_text("title", &draft.title, MAX_TITLE_LEN)?;
    check_text("description", &draft.description, MAX_DESCRIPTION_LEN)?;
    check_latitude(draft.latitude)?;
    check_longitude(draft.longitude)?;
    if let Some(ref address) = draft.address {
        check_max_len("address", address, MAX_ADDRESS_LEN)?;
    }
    Ok(())
}

/// Check the fields a patch sets. An empty patch passes here; the
/// engine rejects it separately.
///
/// # Errors
///
/// Returns `InvalidArgument` on the first rule the patch breaks.
pub fn validate_patch(patch: &IssuePatch) -> Result<()> {
    if let Some(ref title) = patch.title {
        check_text("title", title, MAX_TITLE_LEN)?;
    }
    if let Some(ref description) = patch.description {
        check_text("description", description, MAX_DESCRIPTION_LEN)?;
    }
    if let Some(lat) = patch.latitude {
        check_latitude(lat)?;
    }
    if let Some(lon) = patch.longitude {
        check_longitude(lon)?;
    }
    if let Some(ref address) = patch.address {
        check_max_len("address", address, MAX_ADDRESS_LEN)?;
    }
    Ok(())
}

/// Check a registration before the user is stored.
///
/// # Errors
///
/// Returns `InvalidArgument` for a blank or overlong name, or a malformed email.
pub fn validate_registration(name: &str, email: &str) -> Result<()> {
    check_text("name", name, MAX_NAME_LEN)?;

    let email = email.trim();
    let well_formed = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.'));
    if !well_formed || email.chars().any(char::is_whitespace) {
        return Err(Error::InvalidArgument(format!("invalid email '{email}'")));
    }
    Ok(())
}

fn check_text(field: &str, value: &str, max: usize) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidArgument(format!("{field} must not be empty")));
    }
    check_max_len(field, value, max)
}

fn check_max_len(field: &str, value: &str, max: usize) -> Result<()> {
    if value.chars().count() > max {
        return Err(Error::InvalidArgument(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

fn check_latitude(lat: f64) -> Result<()> {
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err(Error::InvalidArgument(format!(
            "latitude {lat} is outside -90..90"
        )));
    }
    Ok(())
}

fn check_longitude(lon: f64) -> Result<()> {
    if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
        return Err(Error::InvalidArgument(format!(
            "longitude {lon} is outside -180..180"
        )));
    }
    Ok(())
}
