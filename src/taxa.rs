//! The taxon universe shared by both trees of a computation.
//!
//! Taxa are referred to by integer ids inside the algorithm. Ids are handed
//! out after sorting the names alphabetically, the same way every tree over
//! the same names gets the same bit positions regardless of parse order.

use crate::bitset::Bitset;
use itertools::Itertools;
use rustc_hash::FxHashMap;

/// Immutable mapping between taxon names and ids.
#[derive(Debug, Clone, Default)]
pub struct TaxonSet {
    names: Vec<String>,
    index: FxHashMap<String, usize>,
}

impl TaxonSet {
    /// Builds the universe from any collection of names. Duplicates collapse.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).sorted().dedup().collect();
        let index = names
            .iter()
            .enumerate()
            .map(|(id, name)| (name.clone(), id))
            .collect();
        TaxonSet { names, index }
    }

    pub fn id_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn name_of(&self, id: usize) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Number of u64 words a bitset over this universe needs.
    pub fn words(&self) -> usize {
        self.names.len().div_ceil(64).max(1)
    }

    /// Names of the taxa in `set`, in id order.
    pub fn names_in<'a>(&'a self, set: &'a Bitset) -> impl Iterator<Item = &'a str> + 'a {
        set.iter_ones().filter_map(|id| self.name_of(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_follow_alphabetical_order() {
        let taxa = TaxonSet::from_names(["Human", "Chimp", "Gorilla", "Chimp"]);
        assert_eq!(taxa.len(), 3);
        assert_eq!(taxa.id_of("Chimp"), Some(0));
        assert_eq!(taxa.id_of("Gorilla"), Some(1));
        assert_eq!(taxa.id_of("Human"), Some(2));
        assert_eq!(taxa.name_of(2), Some("Human"));
        assert_eq!(taxa.id_of("Bonobo"), None);
    }

    #[test]
    fn test_words_and_names_in() {
        let taxa = TaxonSet::from_names(["c", "a", "b"]);
        assert_eq!(taxa.len(), 3);
        assert_eq!(taxa.words(), 1);

        let some = Bitset::from_indices(taxa.words(), [0, 2]);
        assert_eq!(taxa.names_in(&some).collect::<Vec<_>>(), vec!["a", "c"]);
    }
}
