//! 문서별 단일 쓰기 잠금
//!
//! 저장 호출이 진행되는 동안 같은 문서에 대한 다른 저장(제자리 저장/분기/자동 저장)을 막습니다.
//! 기다리게 하지 않고 즉시 거절합니다. 토큰이 drop되면 성공이든 실패든 잠금이 풀립니다.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

#[derive(Clone, Default)]
pub struct SaveLocks {
    held: Arc<Mutex<HashSet<String>>>,
}

impl SaveLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 잠금을 얻습니다. 이미 다른 저장이 잡고 있으면 None.
    pub fn try_acquire(&self, document_id: &str) -> Option<SaveToken> {
        let mut held = self.held.lock();
        if !held.insert(document_id.to_string()) {
            return None;
        }
        Some(SaveToken {
            document_id: document_id.to_string(),
            held: self.held.clone(),
        })
    }

    pub fn is_held(&self, document_id: &str) -> bool {
        self.held.lock().contains(document_id)
    }
}

#[must_use = "the save lock is released as soon as the token is dropped"]
#[derive(Debug)]
pub struct SaveToken {
    document_id: String,
    held: Arc<Mutex<HashSet<String>>>,
}

impl Drop for SaveToken {
    fn drop(&mut self) {
        self.held.lock().remove(&self.document_id);
    }
}
