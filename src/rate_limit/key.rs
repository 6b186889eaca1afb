use sha2::{Digest, Sha256};

/// 限流键：调用者身份 + 被限流资源
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LimitKey {
    identity: String,
    resource: String,
}

impl LimitKey {
    pub fn new(identity: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            resource: resource.into(),
        }
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// 长度前缀编码，身份或资源中包含 ':' 也不会与其他键冲突
    pub fn encode(&self) -> String {
        format!(
            "{}:{}{}:{}",
            self.identity.len(),
            self.identity,
            self.resource.len(),
            self.resource
        )
    }

    /// 存储用键：编码后的 SHA-256 十六进制摘要，长度固定
    pub fn storage_key(&self) -> String {
        let digest = Sha256::digest(self.encode().as_bytes());
        format!("{:x}", digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delimiter_in_identity_does_not_collide() {
        // 简单拼接时两者都是 "alice:x:/lessons"
        let a = LimitKey::new("alice:x", "/lessons");
        let b = LimitKey::new("alice", "x:/lessons");

        assert_ne!(a.encode(), b.encode());
        assert_ne!(a.storage_key(), b.storage_key());
    }

    #[test]
    fn storage_key_is_deterministic() {
        let a = LimitKey::new("user-1", "/api/lessons/generate");
        let b = LimitKey::new("user-1", "/api/lessons/generate");

        assert_eq!(a.storage_key(), b.storage_key());
        assert_eq!(a.storage_key().len(), 64);
        assert!(a.storage_key().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn identity_and_resource_both_matter() {
        let base = LimitKey::new("user-1", "/me");
        assert_ne!(base.storage_key(), LimitKey::new("user-2", "/me").storage_key());
        assert_ne!(base.storage_key(), LimitKey::new("user-1", "/quota").storage_key());
    }
}
