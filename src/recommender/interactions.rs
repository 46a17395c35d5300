use serde::{Deserialize, Serialize};

use crate::domain::{BuyerId, ItemId};

/// One user/item signal fed to the oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub user_id: BuyerId,
    pub item_id: ItemId,
    pub rating: f64,
}

/// Anything that can produce the current interaction snapshot. Passed
/// explicitly to whoever needs it instead of swapping a shared loader.
pub trait InteractionSource: Send + Sync {
    fn interactions(&self) -> Vec<Interaction>;
}

impl InteractionSource for Vec<Interaction> {
    fn interactions(&self) -> Vec<Interaction> {
        self.clone()
    }
}

/// Fallback data set used when nothing else is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockInteractions;

impl InteractionSource for MockInteractions {
    fn interactions(&self) -> Vec<Interaction> {
        [(1, 101, 5.0), (1, 102, 3.0), (2, 101, 4.0), (2, 103, 2.0), (3, 104, 5.0), (3, 101, 1.0)]
            .into_iter()
            .map(|(user_id, item_id, rating)| Interaction { user_id, item_id, rating })
            .collect()
    }
}
