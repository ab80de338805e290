//! Reference data used to resolve foreign keys into display names.

use std::collections::HashMap;

use tracing::debug;

use crate::{
    api::LibraryApi,
    errors::{settle2, ClientResult},
    models::{Book, Id, Member},
};

/// Snapshot of members and books for one page activation.
///
/// Built once per load and never patched: after any mutation the owning
/// page reloads it whole. Lookups miss with `None`; callers pick the
/// placeholder text.
#[derive(Debug, Clone, Default)]
pub struct ReferenceCache {
    members: Vec<Member>,
    books: Vec<Book>,
    member_index: HashMap<Id, usize>,
    book_index: HashMap<Id, usize>,
    loaded: bool,
}

impl ReferenceCache {
    #[must_use]
    pub fn from_parts(members: Vec<Member>, books: Vec<Book>) -> Self {
        let member_index = index_by(&members, |m| &m.id);
        let book_index = index_by(&books, |b| &b.id);
        Self {
            members,
            books,
            member_index,
            book_index,
            loaded: true,
        }
    }

    /// Fetch members and books concurrently.
    ///
    /// # Errors
    /// Fails as a whole if either request fails.
    pub async fn load_all(api: &dyn LibraryApi) -> ClientResult<Self> {
        let (members, books) = tokio::join!(api.list_members(), api.list_books());
        let (members, books) = settle2(members, books)?;
        debug!(members = members.len(), books = books.len(), "reference cache loaded");
        Ok(Self::from_parts(members, books))
    }

    /// Whether this cache holds a completed load.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    #[must_use]
    pub fn member(&self, id: &Id) -> Option<&Member> {
        self.member_index.get(id).map(|&i| &self.members[i])
    }

    #[must_use]
    pub fn book(&self, id: &Id) -> Option<&Book> {
        self.book_index.get(id).map(|&i| &self.books[i])
    }

    /// Members in backend order, for pickers.
    #[must_use]
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Books in backend order, for pickers.
    #[must_use]
    pub fn books(&self) -> &[Book] {
        &self.books
    }
}

fn index_by<T>(items: &[T], key: impl Fn(&T) -> &Id) -> HashMap<Id, usize> {
    let mut index = HashMap::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        // first occurrence wins, matching a front-to-back scan
        index.entry(key(item).clone()).or_insert(i);
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(id: &str, name: &str) -> Member {
        Member {
            id: Id::from(id),
            national_id: "3201010101010001".into(),
            name: name.into(),
            address: String::new(),
            birth_date: None,
        }
    }

    #[test]
    fn lookups_resolve_mixed_id_encodings() {
        let members: Vec<Member> = serde_json::from_value(serde_json::json!([
            {"id": 7, "nama": "Sari"},
            {"id": "8", "nama": "Budi"}
        ]))
        .unwrap();
        let cache = ReferenceCache::from_parts(members, vec![]);
        assert_eq!(cache.member(&Id::from("7")).unwrap().name, "Sari");
        assert_eq!(cache.member(&Id::from(8)).unwrap().name, "Budi");
        assert!(cache.member(&Id::from("9")).is_none());
        assert!(cache.book(&Id::from("7")).is_none());
    }

    #[test]
    fn duplicate_ids_resolve_to_first_entry() {
        let cache =
            ReferenceCache::from_parts(vec![member("1", "first"), member("1", "second")], vec![]);
        assert_eq!(cache.member(&Id::from("1")).unwrap().name, "first");
        assert_eq!(cache.members().len(), 2);
    }

    #[test]
    fn default_cache_is_not_loaded() {
        assert!(!ReferenceCache::default().is_loaded());
        assert!(ReferenceCache::from_parts(vec![], vec![]).is_loaded());
    }
}
