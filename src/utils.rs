use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use rand::{distributions::Alphanumeric, Rng};
use uuid::Uuid;

pub fn new_id() -> String {
    Uuid::new_v4().hyphenated().to_string()
}

/// Request reference such as `DEP1A2B3C4D`.
pub fn new_reference(prefix: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{}{}", prefix, id[..8].to_uppercase())
}

pub fn new_referral_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(|c| char::from(c).to_ascii_uppercase())
        .collect()
}

pub fn new_token() -> String {
    format!(
        "{}{}",
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    )
}

pub const PASSWORD_COST: u32 = bcrypt::DEFAULT_COST;

/// Bcrypt hash with its salt embedded.
pub fn hash_password(password: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, cost)
}

/// A malformed stored hash never verifies.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

pub fn local_offset(utc_offset_hours: i32) -> FixedOffset {
    FixedOffset::east_opt(utc_offset_hours * 3600).unwrap_or_else(|| Utc.fix())
}

pub fn local_date(now: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    now.with_timezone(&offset).date_naive()
}

/// Keeps only the final path component of an uploaded file name.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "archivo".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_reference_format() {
        let reference = new_reference("DEP");
        assert_eq!(reference.len(), 11);
        assert!(reference.starts_with("DEP"));
        assert!(reference[3..]
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn test_password_hashing() {
        let a = hash_password("secreto", 4).unwrap();
        let b = hash_password("secreto", 4).unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with("$2b$04$"));
        assert!(verify_password("secreto", &a));
        assert!(verify_password("secreto", &b));
        assert!(!verify_password("Secreto", &a));
        assert!(!verify_password("secreto", "not-a-hash"));
    }

    #[test]
    fn test_local_date_crosses_midnight() {
        let offset = local_offset(-5);
        let now = Utc.with_ymd_and_hms(2025, 3, 2, 3, 0, 0).unwrap();
        assert_eq!(
            local_date(now, offset),
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
        );
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\docs\\cedula 1.png"), "cedula1.png");
        assert_eq!(sanitize_file_name(".."), "archivo");
    }
}
