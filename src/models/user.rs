use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// 身份服务提供的用户资料（核心只读）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub full_name: String,
    /// 专业，例如 BSIT / BSIS / BSCS
    pub program: Option<String>,
    /// 年级（同届分组依据），例如 "1st" .. "4th"
    pub year: Option<String>,
    /// 专业方向，例如 "Web Development"
    #[serde(default)]
    pub track: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(full_name: impl Into<String>, program: Option<&str>, year: Option<&str>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            full_name: full_name.into(),
            program: program.map(str::to_string),
            year: year.map(str::to_string),
            track: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_track(mut self, track: &str) -> Self {
        self.track = Some(track.to_string());
        self
    }

    /// 同届分组属性，空字符串视为缺失
    pub fn cohort(&self) -> Option<&str> {
        self.year.as_deref().map(str::trim).filter(|y| !y.is_empty())
    }
}

/// 注销账号时删除的核心数据
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountDeleted {
    pub projects_deleted: usize,
    pub notifications_deleted: u64,
}

/// 将查询参数里的年级简写（"1"）规范化为存储格式（"1st"）
pub fn normalize_year(year: &str) -> String {
    match year.trim() {
        "1" => "1st".to_string(),
        "2" => "2nd".to_string(),
        "3" => "3rd".to_string(),
        "4" => "4th".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cohort_ignores_blank_year() {
        let user = UserProfile::new("Ana", Some("BSIT"), Some("  "));
        assert_eq!(user.cohort(), None);

        let user = UserProfile::new("Ana", Some("BSIT"), Some("2nd"));
        assert_eq!(user.cohort(), Some("2nd"));
    }

    #[test]
    fn test_normalize_year() {
        assert_eq!(normalize_year("1"), "1st");
        assert_eq!(normalize_year("4"), "4th");
        assert_eq!(normalize_year("3rd"), "3rd");
    }
}
