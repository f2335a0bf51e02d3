use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Like {
    pub actor_id: String,
    pub project_id: String,
    pub created_at: DateTime<Utc>,
}

impl Like {
    pub fn new(actor_id: &str, project_id: &str) -> Self {
        Self {
            actor_id: actor_id.to_string(),
            project_id: project_id.to_string(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct View {
    pub actor_id: String,
    pub project_id: String,
    pub created_at: DateTime<Utc>,
}

impl View {
    pub fn new(actor_id: &str, project_id: &str) -> Self {
        Self {
            actor_id: actor_id.to_string(),
            project_id: project_id.to_string(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub actor_id: String,
    pub project_id: String,
    pub text: String,
    #[serde(default)]
    pub replies: Vec<Reply>,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(actor_id: &str, project_id: &str, text: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            actor_id: actor_id.to_string(),
            project_id: project_id.to_string(),
            text: text.to_string(),
            replies: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn find_reply(&self, reply_id: &str) -> Option<&Reply> {
        self.replies.iter().find(|r| r.id == reply_id)
    }
}

/// 嵌入在评论内的回复，不持有父评论引用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub id: String,
    pub actor_id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Reply {
    pub fn new(actor_id: &str, text: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            actor_id: actor_id.to_string(),
            text: text.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// 单个项目的评论统计：顶层评论数与回复总数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentTally {
    pub top_level: u64,
    pub replies: u64,
}

impl CommentTally {
    pub fn total(&self) -> u64 {
        self.top_level + self.replies
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementCounts {
    pub like_count: u64,
    pub comment_count: u64,
    pub view_count: u64,
}

impl EngagementCounts {
    /// 热度只计点赞与浏览，评论不参与
    pub fn popularity(&self) -> u64 {
        popularity(self.like_count, self.view_count)
    }
}

pub fn popularity(like_count: u64, view_count: u64) -> u64 {
    like_count + view_count
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CommentRequest {
    /// 长度上限由 `max_comment_length` 配置在服务层校验
    #[validate(length(min = 1, message = "Comment text is required"))]
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LikeToggle {
    pub liked: bool,
    pub like_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewRecorded {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentCreated {
    pub comment: Comment,
    pub comment_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyCreated {
    pub reply: Reply,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentDeleted {
    pub ok: bool,
    pub comment_id: String,
    pub comment_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyDeleted {
    pub ok: bool,
    pub reply_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_popularity_excludes_comments() {
        let counts = EngagementCounts {
            like_count: 5,
            comment_count: 10,
            view_count: 2,
        };
        assert_eq!(counts.popularity(), 7);
    }

    #[test]
    fn test_find_reply_by_id() {
        let mut comment = Comment::new("u1", "p1", "nice");
        let reply = Reply::new("u2", "thanks");
        comment.replies.push(reply.clone());
        assert_eq!(comment.find_reply(&reply.id), Some(&reply));
        assert!(comment.find_reply("missing").is_none());
    }

    #[test]
    fn test_comment_request_leaves_length_cap_to_config() {
        let long = CommentRequest { text: "a".repeat(20_000) };
        assert!(long.validate().is_ok());

        let empty = CommentRequest { text: String::new() };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_comment_tally_total() {
        let tally = CommentTally { top_level: 3, replies: 7 };
        assert_eq!(tally.total(), 10);
    }
}
