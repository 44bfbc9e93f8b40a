//! An in-memory ordered index: a balanced, pool-allocated, multi-way search
//! tree mapping a totally ordered key domain to opaque values.
//!
//! The node layout gives every node (leaf or internal) the same number of
//! key slots as child/value slots — unlike the classical B-tree, which gives
//! internal nodes one more child than key. Leaves sit at height 0; an
//! internal node's `keys[i]` (for `i >= 1`) is the minimum key reachable
//! through `children[i]`, and `keys[0]` is never read.
//!
//! ```
//! use btree_core::Tree;
//!
//! let mut tree: Tree<u32, &str> = Tree::new(4).unwrap();
//! tree.insert(1, "a").unwrap();
//! tree.insert(2, "b").unwrap();
//! assert_eq!(tree.get(&1), Some(&"a"));
//! assert_eq!(tree.delete(&2), Some("b"));
//! assert_eq!(tree.get(&2), None);
//! ```

mod error;
mod node;
mod order;
mod pool;
mod tree;

pub use error::BtreeError;
pub use order::{KeyOrder, NaturalOrder};
pub use tree::Tree;
