//! Compare tree topologies through rooted triples.
//!
//! A triple is the smallest informative rooted statement a tree makes: for
//! three taxa it names the one that branched off first. Two trees over the
//! same taxa can then be compared by the fraction of triples they share,
//! and an unrooted tree can be scored against a rooted reference by trying
//! every possible root placement and keeping the best score.

use std::collections::{HashMap, HashSet};
use std::fmt::{Debug, Display};

use itertools::Itertools;
use thiserror::Error;

use crate::tree::{NewickParseError, NodeId, Tree, TreeError};

/// Errors that can occur when extracting or comparing triples.
#[derive(Error, Debug)]
pub enum TripleError {
    /// The outgroup of a triple must be distinct from both ingroup members
    #[error("Outgroup {0} cannot also be an ingroup member")]
    OutgroupInIngroup(String),
    /// Similarity is only defined between triple sets over the same taxa,
    /// which implies equal cardinality
    #[error("Cannot compare triple sets of sizes {0} and {1}")]
    SizeMismatch(usize, usize),
    /// No rooting of the candidate tree shared a single triple with the
    /// reference. For trees over a shared taxon set this cannot happen and
    /// indicates corrupt input
    #[error("No rooting shared any triples with the reference tree")]
    NoSharedTriples,
    /// There was a [`TreeError`] while walking a tree
    #[error("Could not walk the tree")]
    TreeError(#[from] TreeError),
    /// There was a [`NewickParseError`] while rebuilding a rerooted tree
    #[error("Could not rebuild the rerooted tree")]
    NewickError(#[from] NewickParseError),
}

/// A rooted 3-taxon statement: the outgroup is more distantly related than
/// either member of the ingroup pair.
///
/// The ingroup pair is unordered, so the pair is normalized at construction
/// and `(X,(Y,Z))` and `(X,(Z,Y))` compare and hash as the same triple.
/// ```
/// use tripletree::triple::Triple;
///
/// let t1 = Triple::new("a", "c", "b").unwrap();
/// let t2 = Triple::new("a", "b", "c").unwrap();
///
/// assert_eq!(t1, t2);
/// assert_eq!(t1.to_string(), "(a,(b,c));");
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Triple {
    outgroup: String,
    ingroup: (String, String),
}

impl Triple {
    /// Creates a triple from an outgroup label and an unordered ingroup pair.
    /// Returns an error if the outgroup is also an ingroup member.
    pub fn new(outgroup: &str, a: &str, b: &str) -> Result<Self, TripleError> {
        if outgroup == a || outgroup == b {
            return Err(TripleError::OutgroupInIngroup(outgroup.to_string()));
        }

        let (first, second) = if a <= b { (a, b) } else { (b, a) };

        Ok(Self {
            outgroup: outgroup.to_string(),
            ingroup: (first.to_string(), second.to_string()),
        })
    }

    /// The taxon that branched off before the ingroup pair diverged
    pub fn outgroup(&self) -> &str {
        &self.outgroup
    }

    /// The two taxa that are closer to each other than to the outgroup,
    /// in normalized order
    pub fn ingroup(&self) -> (&str, &str) {
        (&self.ingroup.0, &self.ingroup.1)
    }
}

impl Display for Triple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({},({},{}));",
            self.outgroup, self.ingroup.0, self.ingroup.1
        )
    }
}

impl Debug for Triple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

/// Extracts the full set of triples entailed by a tree's topology.
///
/// Every internal node splits the taxa into the leaves below it and the rest
/// of the tree; each pair below together with each taxon outside yields one
/// triple. Summed over a fully resolved binary tree on `n` leaves this
/// produces exactly `C(n,3)` distinct triples.
/// ```
/// use tripletree::triple::{make_triples, Triple};
/// use tripletree::tree::Tree;
///
/// let tree = Tree::from_newick("(a,((b,c),(d,e)));").unwrap();
/// let triples = make_triples(&tree).unwrap();
///
/// assert_eq!(triples.len(), 10); // C(5,3)
/// assert!(triples.contains(&Triple::new("a", "b", "c").unwrap()));
/// ```
pub fn make_triples(tree: &Tree) -> Result<HashSet<Triple>, TripleError> {
    if !tree.has_unique_tip_names()? {
        return Err(TreeError::DuplicateLeafNames.into());
    }

    let taxa: HashSet<String> = tree.get_leaf_names().into_iter().flatten().collect();

    let root = tree.get_root()?;
    let mut triples = HashSet::new();

    // Descendant label lists live in this map, keyed by node id, and never
    // touch the tree itself. Entries are consumed by the parent node, so the
    // map stays small and nothing survives the call.
    let mut descendants: HashMap<NodeId, Vec<String>> = HashMap::new();

    for node_id in tree.postorder(&root)? {
        if node_id == root {
            continue;
        }

        let node = tree.get(&node_id)?;

        if node.is_tip() {
            let name = node.name.clone().ok_or(TreeError::UnnamedLeaves)?;
            descendants.insert(node_id, vec![name]);
            continue;
        }

        let mut ingroup = Vec::new();
        for child in node.children.iter() {
            ingroup.append(&mut descendants.remove(child).unwrap_or_default());
        }

        for outgroup in taxa.iter().filter(|taxon| !ingroup.contains(*taxon)) {
            for (a, b) in ingroup.iter().tuple_combinations() {
                triples.insert(Triple::new(outgroup, a, b)?);
            }
        }

        descendants.insert(node_id, ingroup);
    }

    Ok(triples)
}

/// Computes the fraction of shared triples between two triple sets.
///
/// Both sets must have the same cardinality (i.e. come from trees over the
/// same taxon set); 1.0 means identical sets, 0.0 disjoint ones.
pub fn triple_similarity(
    triples_1: &HashSet<Triple>,
    triples_2: &HashSet<Triple>,
) -> Result<f64, TripleError> {
    if triples_1.len() != triples_2.len() {
        return Err(TripleError::SizeMismatch(triples_1.len(), triples_2.len()));
    }
    if triples_1.is_empty() {
        // Fewer than 3 taxa entail no triples, and two empty sets are identical
        return Ok(1.0);
    }

    Ok(triples_1.intersection(triples_2).count() as f64 / triples_1.len() as f64)
}

/// Extracts triples from both trees and computes their similarity.
/// ```
/// use tripletree::triple::tree_triple_similarity;
/// use tripletree::tree::Tree;
///
/// let tree_1 = Tree::from_newick("(a,((b,c),(d,e)));").unwrap();
/// let tree_2 = Tree::from_newick("((a,b),(c,(d,e)));").unwrap();
///
/// assert_eq!(tree_triple_similarity(&tree_1, &tree_2).unwrap(), 0.5);
/// ```
pub fn tree_triple_similarity(tree_1: &Tree, tree_2: &Tree) -> Result<f64, TripleError> {
    let triples_1 = make_triples(tree_1)?;
    let triples_2 = make_triples(tree_2)?;

    triple_similarity(&triples_1, &triples_2)
}

/// One side of a rerooted tree while it is being assembled: either a single
/// leaf or a grouping of neighbouring components.
enum Clade {
    Leaf(String),
    Internal(Vec<Clade>),
}

impl Clade {
    fn to_newick(&self) -> String {
        match self {
            Clade::Leaf(name) => name.clone(),
            Clade::Internal(components) => {
                format!("({})", components.iter().map(Clade::to_newick).join(","))
            }
        }
    }
}

/// Builds a new tree representing the same unrooted topology as the input,
/// rooted on the edge between `node` and its parent. The input tree is not
/// modified.
///
/// If `node` is the representational root, or a child of a bifurcating root
/// (in which case the requested edge already carries the root), the tree is
/// returned as is.
pub fn root_at_node(tree: &Tree, node: &NodeId) -> Result<Tree, TripleError> {
    let parent = match tree.get(node)?.parent {
        None => return Ok(tree.clone()),
        Some(parent) => parent,
    };

    let parent_node = tree.get(&parent)?;
    if parent_node.is_root() && parent_node.children.len() == 2 {
        return Ok(tree.clone());
    }

    // Split the tree across the {node, parent} edge: each side is collected
    // by walking outward from one endpoint, banned from crossing back.
    let sides = (
        collect_side(tree, &parent, Some(*node))?,
        collect_side(tree, node, Some(parent))?,
    );

    let newick = format!("({},{});", sides.0.to_newick(), sides.1.to_newick());
    Ok(Tree::from_newick(&newick)?)
}

/// Depth-first walk over the undirected view of the tree, collecting every
/// reachable component except through the banned neighbour.
fn collect_side(tree: &Tree, node: &NodeId, banned: Option<NodeId>) -> Result<Clade, TripleError> {
    let current = tree.get(node)?;
    if current.is_tip() {
        let name = current.name.clone().ok_or(TreeError::UnnamedLeaves)?;
        return Ok(Clade::Leaf(name));
    }

    let mut components = Vec::new();
    for neighbour in tree.neighbours_except(node, banned)? {
        let component = collect_side(tree, &neighbour, Some(*node))?;

        // Crossing the old root leaves it with a single direction to
        // express; unwrap the grouping so no unary node is produced.
        let component = match component {
            Clade::Internal(mut inner) if inner.len() == 1 => inner.remove(0),
            other => other,
        };

        components.push(component);
    }

    Ok(Clade::Internal(components))
}

/// Searches every rooting of `rerootable` for the one that best agrees with
/// the triples of `fixed`, and returns the best similarity found.
///
/// Each non-root node of `rerootable` denotes a candidate root edge (the one
/// above it). A rooting scoring exactly 1.0 is returned immediately since
/// the measure cannot exceed it.
/// ```
/// use tripletree::triple::optimise_tree_triple_similarity;
/// use tripletree::tree::Tree;
///
/// let fixed = Tree::from_newick("(a,((b,c),(d,e)));").unwrap();
/// // Same unrooted topology as `fixed`, rooted somewhere else entirely
/// let rerootable = Tree::from_newick("((e,((b,c),a)),d);").unwrap();
///
/// let best = optimise_tree_triple_similarity(&fixed, &rerootable).unwrap();
/// assert_eq!(best, 1.0);
/// ```
pub fn optimise_tree_triple_similarity(
    fixed: &Tree,
    rerootable: &Tree,
) -> Result<f64, TripleError> {
    let triples_fixed = make_triples(fixed)?;

    let root = rerootable.get_root()?;
    let mut best_similarity = -1.0;

    for node_id in rerootable.postorder(&root)? {
        if node_id == root {
            continue;
        }

        let prospective = root_at_node(rerootable, &node_id)?;
        let similarity = triple_similarity(&triples_fixed, &make_triples(&prospective)?)?;

        if similarity == 1.0 {
            return Ok(similarity);
        }
        best_similarity = f64::max(best_similarity, similarity);
    }

    if best_similarity <= 0.0 {
        return Err(TripleError::NoSharedTriples);
    }

    Ok(best_similarity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distr::Distr;
    use crate::generate_tree;

    fn choose_3(n: usize) -> usize {
        n * (n - 1) * (n - 2) / 6
    }

    #[test]
    fn triple_normalization() {
        let t1 = Triple::new("x", "b", "a").unwrap();
        let t2 = Triple::new("x", "a", "b").unwrap();

        assert_eq!(t1, t2);
        assert_eq!(t1.ingroup(), ("a", "b"));
        assert_eq!(t1.outgroup(), "x");
        assert_eq!(format!("{t1}"), "(x,(a,b));");

        let mut set = HashSet::new();
        set.insert(t1);
        assert!(set.contains(&t2));
    }

    #[test]
    fn outgroup_in_ingroup() {
        assert!(Triple::new("a", "a", "b").is_err());
        assert!(Triple::new("a", "b", "a").is_err());
        assert!(Triple::new("a", "b", "c").is_ok());
    }

    #[test]
    fn triples_of_small_tree() {
        let tree = Tree::from_newick("(a,((b,c),(d,e)));").unwrap();
        let triples = make_triples(&tree).unwrap();

        assert_eq!(triples.len(), choose_3(5));

        let expected = [
            ("a", "b", "c"),
            ("d", "b", "c"),
            ("e", "b", "c"),
            ("a", "d", "e"),
            ("b", "d", "e"),
            ("c", "d", "e"),
            ("a", "b", "d"),
            ("a", "b", "e"),
            ("a", "c", "d"),
            ("a", "c", "e"),
        ];
        for (outgroup, x, y) in expected {
            let triple = Triple::new(outgroup, x, y).unwrap();
            assert!(triples.contains(&triple), "missing {triple}");
        }
    }

    #[test]
    fn triple_count_on_random_trees() {
        for n_leaves in [4, 6, 8, 12] {
            let tree = generate_tree(n_leaves, false, Distr::Uniform).unwrap();
            let triples = make_triples(&tree).unwrap();
            assert_eq!(triples.len(), choose_3(n_leaves));
        }
    }

    #[test]
    fn each_subset_resolved_once() {
        let tree = generate_tree(8, false, Distr::Uniform).unwrap();
        let triples = make_triples(&tree).unwrap();

        let subsets: HashSet<Vec<&str>> = triples
            .iter()
            .map(|t| {
                let (a, b) = t.ingroup();
                let mut subset = vec![t.outgroup(), a, b];
                subset.sort();
                subset
            })
            .collect();

        // One topology assignment per unordered 3-taxon subset
        assert_eq!(subsets.len(), triples.len());
    }

    #[test]
    fn duplicate_tips_rejected() {
        let tree = Tree::from_newick("((a,b),(a,c));").unwrap();
        assert!(make_triples(&tree).is_err());
    }

    #[test]
    fn self_similarity() {
        for newick in ["(a,((b,c),(d,e)));", "((a,b),(c,(d,e)));", "(a,b,(c,d));"] {
            let tree = Tree::from_newick(newick).unwrap();
            assert_eq!(tree_triple_similarity(&tree, &tree).unwrap(), 1.0);
        }
    }

    #[test]
    fn similarity_is_symmetric() {
        let tree_1 = Tree::from_newick("(a,((b,c),(d,e)));").unwrap();
        let tree_2 = Tree::from_newick("((a,b),(c,(d,e)));").unwrap();

        let s12 = tree_triple_similarity(&tree_1, &tree_2).unwrap();
        let s21 = tree_triple_similarity(&tree_2, &tree_1).unwrap();

        assert_eq!(s12, s21);
        assert_eq!(s12, 0.5);
    }

    #[test]
    fn size_mismatch_fails() {
        let tree_1 = Tree::from_newick("(a,((b,c),(d,e)));").unwrap();
        let tree_2 = Tree::from_newick("((a,b),(c,d));").unwrap();

        let result = tree_triple_similarity(&tree_1, &tree_2);
        assert!(matches!(result, Err(TripleError::SizeMismatch(10, 4))));
    }

    #[test]
    fn rooting_at_root_is_identity() {
        let tree = Tree::from_newick("(a,((b,c),(d,e)));").unwrap();
        let root = tree.get_root().unwrap();

        let rerooted = root_at_node(&tree, &root).unwrap();
        assert_eq!(rerooted.to_newick().unwrap(), tree.to_newick().unwrap());
    }

    #[test]
    fn rooting_below_bifurcating_root_is_identity() {
        let tree = Tree::from_newick("((a,b),(c,(d,e)));").unwrap();
        let node = tree.get_by_name("c").unwrap().parent.unwrap();

        let rerooted = root_at_node(&tree, &node).unwrap();
        assert_eq!(rerooted.to_newick().unwrap(), tree.to_newick().unwrap());
    }

    #[test]
    fn rooting_preserves_leaves_and_topology() {
        let tree = Tree::from_newick("(a,((b,c),(d,e)));").unwrap();
        let root = tree.get_root().unwrap();

        let mut names: Vec<_> = tree.get_leaf_names().into_iter().flatten().collect();
        names.sort();

        for node_id in tree.postorder(&root).unwrap() {
            if node_id == root {
                continue;
            }
            let rerooted = root_at_node(&tree, &node_id).unwrap();

            let mut rerooted_names: Vec<_> =
                rerooted.get_leaf_names().into_iter().flatten().collect();
            rerooted_names.sort();
            assert_eq!(names, rerooted_names);

            // Rerooting must not change the unrooted topology, so searching
            // over rootings of the result must recover the original exactly
            let recovered = optimise_tree_triple_similarity(&tree, &rerooted).unwrap();
            assert_eq!(recovered, 1.0, "lost topology rooting below {node_id}");
        }
    }

    #[test]
    fn rooting_at_deep_leaf() {
        let tree = Tree::from_newick("(a,((b,c),(d,e)));").unwrap();
        let b = tree.get_by_name("b").unwrap().id;

        let rerooted = root_at_node(&tree, &b).unwrap();

        // The new root sits on the edge above b: one side is the leaf itself
        let root = rerooted.get_root().unwrap();
        let root_children = &rerooted.get(&root).unwrap().children;
        assert_eq!(root_children.len(), 2);
        assert!(root_children
            .iter()
            .any(|id| rerooted.get(id).unwrap().name.as_deref() == Some("b")));
        assert_eq!(rerooted.n_leaves(), 5);
    }

    #[test]
    fn optimisation_of_identical_trees() {
        let tree = Tree::from_newick("(a,((b,c),(d,e)));").unwrap();
        assert_eq!(optimise_tree_triple_similarity(&tree, &tree).unwrap(), 1.0);
    }

    #[test]
    fn optimisation_recovers_rerooted_copy() {
        let fixed = Tree::from_newick("(a,((b,c),(d,e)));").unwrap();
        let rerootable = Tree::from_newick("((e,((b,c),a)),d);").unwrap();

        // Directly the trees disagree, but some rooting matches perfectly
        assert!(tree_triple_similarity(&fixed, &rerootable).unwrap() < 1.0);
        assert_eq!(
            optimise_tree_triple_similarity(&fixed, &rerootable).unwrap(),
            1.0
        );
    }

    #[test]
    fn optimisation_of_different_topologies() {
        let fixed = Tree::from_newick("(a,((b,c),(d,e)));").unwrap();
        let rerootable = Tree::from_newick("((a,b),(c,(d,e)));").unwrap();

        // No rooting can reconcile distinct unrooted topologies
        let best = optimise_tree_triple_similarity(&fixed, &rerootable).unwrap();
        assert!(best > 0.0);
        assert!(best < 1.0);
    }

    #[test]
    fn similarity_is_a_multiple_of_the_triple_count() {
        let n_taxa = 10;
        let possibilities = choose_3(n_taxa) as f64;

        for _ in 0..500 {
            let tree_1 = generate_tree(n_taxa, false, Distr::Uniform).unwrap();
            let tree_2 = generate_tree(n_taxa, false, Distr::Uniform).unwrap();

            let similarity = tree_triple_similarity(&tree_1, &tree_2).unwrap();
            let shared = similarity * possibilities;

            assert!(
                (shared - shared.round()).abs() < 1e-9,
                "similarity {similarity} is not a multiple of 1/{possibilities}"
            );
            assert!((0.0..=1.0).contains(&similarity));
        }
    }
}
