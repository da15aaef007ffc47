#![warn(missing_docs)]
//! A crate to compare phylogenetic tree topologies through rooted triples.
//!
//! A triple is a rooted 3-taxon statement `(X,(Y,Z))`: taxa `Y` and `Z` are
//! more closely related to each other than either is to `X`. The fraction of
//! triples two trees share is a similarity metric between their topologies,
//! and searching over every possible rooting of one tree makes the metric
//! robust to the two trees being rooted differently.
//!
//! The [`tree`] module holds the [`Tree`] and [`Node`] structs and newick
//! I/O, the [`triple`] module holds the comparison machinery.
//!
//! ```
//! use tripletree::tree::Tree;
//! use tripletree::triple::{optimise_tree_triple_similarity, tree_triple_similarity};
//!
//! let fixed = Tree::from_newick("(a,((b,c),(d,e)));").unwrap();
//! let rerooted = Tree::from_newick("((e,((b,c),a)),d);").unwrap();
//!
//! // Rooted differently the trees disagree on some triples...
//! assert!(tree_triple_similarity(&fixed, &rerooted).unwrap() < 1.0);
//!
//! // ...but some rooting of the second tree agrees perfectly
//! let best = optimise_tree_triple_similarity(&fixed, &rerooted).unwrap();
//! assert_eq!(best, 1.0);
//! ```

use std::collections::VecDeque;

use rand::prelude::*;

use distr::{Distr, Sampler};
use tree::{Node, Tree, TreeError};

pub mod distr;
pub mod tree;
pub mod triple;

/// Generates a random binary tree of a given size, leaves named `T0` to
/// `Tn`. Branch lengths are drawn from the given distribution.
pub fn generate_tree(n_leaves: usize, brlens: bool, sampler_type: Distr) -> Result<Tree, TreeError> {
    let mut tree = Tree::new();
    let mut rng = thread_rng();

    let sampler = Sampler::new(sampler_type);

    let mut next_deq = VecDeque::new();
    next_deq.push_back(tree.add(Node::new()));

    for _ in 0..(n_leaves - 1) {
        let parent_id = if rng.gen_bool(0.5) {
            next_deq.pop_front()
        } else {
            next_deq.pop_back()
        }
        .unwrap();
        let l1: Option<f64> = if brlens {
            Some(sampler.sample(&mut rng))
        } else {
            None
        };
        let l2: Option<f64> = if brlens {
            Some(sampler.sample(&mut rng))
        } else {
            None
        };
        next_deq.push_back(tree.add_child(Node::new(), parent_id, l1)?);
        next_deq.push_back(tree.add_child(Node::new(), parent_id, l2)?);
    }

    for (i, id) in next_deq.iter().enumerate() {
        tree.get_mut(id)?.set_name(format!("T{i}"));
    }

    Ok(tree)
}
