use ptree::{print_tree, TreeBuilder};
use std::collections::HashSet;
use std::{fs, path::Path};

use thiserror::Error;

use super::node::Node;
use super::{EdgeLength, NodeId};

/// Errors that can occur when reading, writing and manipulating [`Tree`] structs.
#[derive(Error, Debug)]
pub enum TreeError {
    /// No root node was found in the tree and we are trying to do something
    /// that requires a root node
    #[error("No root node found")]
    RootNotFound,
    /// Some of the leaves in the tree have no name
    #[error("All your leaf nodes must be named.")]
    UnnamedLeaves,
    /// Some of the leaves in the tree share the same name
    #[error("Your leaf names must be unique.")]
    DuplicateLeafNames,
    /// The requested node with index [`NodeId`] does not exist in the tree
    #[error("There is no node with index: {0}")]
    NodeNotFound(NodeId),
    /// There was a [`std::io::Error`] when writing the tree to a file
    #[error("Error writing tree to file")]
    IoError(#[from] std::io::Error),
}

/// Errors that can occur when parsing newick strings.
#[derive(Error, Debug)]
pub enum NewickParseError {
    /// There is an unclosed bracket in the newick String
    #[error("Missing a closing bracket.")]
    UnclosedBracket,
    /// The newick string is missing a final semi-colon
    #[error("The tree is missing a semi colon at the end.")]
    NoClosingSemicolon,
    /// We are trying to close a subtree but have no parent node.
    #[error("Parent node of subtree not found")]
    NoSubtreeParent,
    /// There was a [`TreeError`] when building a tree from the newick string
    #[error("Problem with building the tree.")]
    TreeError(#[from] TreeError),
    /// There was a [`std::num::ParseFloatError`] when parsing branch lengths
    #[error("Could not parse a branch length")]
    FloatError(#[from] std::num::ParseFloatError),
    /// There was a [`std::io::Error`] when reading a newick file
    #[error("Problem reading file")]
    IoError(#[from] std::io::Error),
}

/// A phylogenetic tree over named tips.
///
/// Unrooted trees are represented with a "virtual root" that has three
/// children, rooted trees with a bifurcating root. Either representation can
/// be fed to the triple machinery in [`crate::triple`].
#[derive(Debug, Clone, Default)]
pub struct Tree {
    nodes: Vec<Node>,
}

/// Base methods to add and get [`Node`] objects to and from the [`Tree`].
///
/// ----
/// ----
impl Tree {
    /// Create a new empty Tree object
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    // ############################
    // # ADDING AND GETTING NODES #
    // ############################

    /// Add a new node to the tree.
    pub fn add(&mut self, node: Node) -> NodeId {
        let idx = self.nodes.len();
        let mut node = node;
        node.id = idx;
        self.nodes.push(node);

        idx
    }

    /// Add a child to one of the tree's nodes.
    ///
    /// # Example
    /// ```
    /// use tripletree::tree::{Tree, Node};
    ///
    /// // Create the tree and add a root node
    /// let mut tree = Tree::new();
    /// let root_id = tree.add(Node::new());
    ///
    /// // Add children to the root
    /// let left = tree.add_child(Node::new(), root_id, None).unwrap();
    /// let right = tree.add_child(Node::new(), root_id, Some(0.1)).unwrap();
    ///
    /// assert_eq!(tree.get(&root_id).unwrap().children.len(), 2);
    ///
    /// // The depths of child nodes are derived from the parent node
    /// assert_eq!(tree.get(&left).unwrap().get_depth(), 1);
    /// assert_eq!(tree.get(&right).unwrap().parent_edge, Some(0.1));
    /// ```
    pub fn add_child(
        &mut self,
        node: Node,
        parent: NodeId,
        edge: Option<EdgeLength>,
    ) -> Result<NodeId, TreeError> {
        if parent >= self.nodes.len() {
            return Err(TreeError::NodeNotFound(parent));
        }

        let mut node = node;

        node.set_parent(parent, edge);
        node.set_depth(self.get(&parent)?.depth + 1);

        let id = self.add(node);

        self.get_mut(&id)?.set_id(id);
        self.get_mut(&parent)?.add_child(id);

        Ok(id)
    }

    /// Get a reference to a specific Node of the tree
    pub fn get(&self, id: &NodeId) -> Result<&Node, TreeError> {
        self.nodes.get(*id).ok_or(TreeError::NodeNotFound(*id))
    }

    /// Get a mutable reference to a specific Node of the tree
    pub fn get_mut(&mut self, id: &NodeId) -> Result<&mut Node, TreeError> {
        self.nodes.get_mut(*id).ok_or(TreeError::NodeNotFound(*id))
    }

    /// Get a reference to a node in the tree by name.
    /// Note that this does not check for name unicity, if several nodes
    /// match a name this function will return the first match in the tree.
    /// ```
    /// use tripletree::tree::{Tree, Node};
    ///
    /// let mut tree = Tree::new();
    /// let root_idx = tree.add(Node::new_named("root"));
    /// let child_idx = tree.add_child(Node::new_named("child"), root_idx, None).unwrap();
    ///
    /// assert_eq!(tree.get_by_name("child"), Some(tree.get(&child_idx).unwrap()));
    /// ```
    pub fn get_by_name(&self, name: &str) -> Option<&Node> {
        self.nodes
            .iter()
            .find(|node| node.name.as_deref() == Some(name))
    }

    /// Gets the root node. In the case of unrooted trees this node is a
    /// "virtual root" that has exactly 3 children.
    pub fn get_root(&self) -> Result<NodeId, TreeError> {
        self.nodes
            .iter()
            .filter(|&node| node.parent.is_none())
            .map(|node| node.id)
            .next()
            .ok_or(TreeError::RootNotFound)
    }

    /// Returns a [`Vec`] containing the Node IDs of leaf nodes of the tree
    pub fn get_leaves(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|&node| node.is_tip())
            .map(|node| node.id)
            .collect()
    }

    /// Returns a [`Vec`] containing the names of the leaf nodes of the tree
    /// ```
    /// use tripletree::tree::{Tree, Node};
    ///
    /// let mut tree = Tree::new();
    /// let root_idx = tree.add(Node::new());
    /// let _ = tree.add_child(Node::new_named("left"), root_idx, None).unwrap();
    /// let _ = tree.add_child(Node::new_named("right"), root_idx, None).unwrap();
    ///
    /// let names: Vec<_> = tree.get_leaf_names()
    ///     .into_iter()
    ///     .flatten()
    ///     .collect();
    /// assert_eq!(names, vec!["left", "right"]);
    /// ```
    pub fn get_leaf_names(&self) -> Vec<Option<String>> {
        self.get_leaves()
            .iter()
            .map(|leaf_id| self.nodes[*leaf_id].name.clone())
            .collect()
    }
}

/// Methods to traverse the [`Tree`]
///
/// ----
/// ----
impl Tree {
    // ###################
    // # TREE TRAVERSALS #
    // ###################

    /// Returns a vector containing node ids in the same order as the
    /// [preorder](https://en.wikipedia.org/wiki/Tree_traversal#Pre-order,_NLR) tree traversal
    /// ```
    /// use tripletree::tree::Tree;
    ///
    /// let tree = Tree::from_newick("((A,(C,E)D)B,(H)G)F;").unwrap();
    /// let preorder: Vec<_> = tree.preorder(&tree.get_root().unwrap())
    ///     .unwrap()
    ///     .iter()
    ///     .map(|id| tree.get(id).unwrap().name.clone())
    ///     .flatten()
    ///     .collect();
    ///
    /// assert_eq!(preorder, vec!["F", "B", "A", "D", "C", "E", "G", "H"])
    /// ```
    pub fn preorder(&self, root: &NodeId) -> Result<Vec<NodeId>, TreeError> {
        let mut indices = vec![*root];
        for child in self.get(root)?.children.iter() {
            indices.extend(self.preorder(child)?)
        }

        Ok(indices)
    }

    /// Returns a vector containing node ids in the same order as the
    /// [postorder](https://en.wikipedia.org/wiki/Tree_traversal#Post-order,_LRN) tree traversal
    /// ```
    /// use tripletree::tree::Tree;
    ///
    /// let tree = Tree::from_newick("((A,(C,E)D)B,(H)G)F;").unwrap();
    /// let postorder: Vec<_> = tree.postorder(&tree.get_root().unwrap())
    ///     .unwrap()
    ///     .iter()
    ///     .map(|id| tree.get(id).unwrap().name.clone())
    ///     .flatten()
    ///     .collect();
    ///
    /// assert_eq!(postorder, vec!["A", "C", "E", "D", "B", "H", "G", "F"])
    /// ```
    pub fn postorder(&self, root: &NodeId) -> Result<Vec<NodeId>, TreeError> {
        let mut indices = vec![];
        for child in self.get(root)?.children.iter() {
            indices.extend(self.postorder(child)?)
        }
        indices.push(*root);

        Ok(indices)
    }

    /// Returns the neighbours of a node in the undirected view of the tree,
    /// i.e. its parent and children, minus an optional banned neighbour.
    /// This is the adjacency used when walking an unrooted tree without
    /// stepping back across the edge we just arrived from.
    /// ```
    /// use tripletree::tree::Tree;
    ///
    /// let tree = Tree::from_newick("((A,B)C,(D,E)G)F;").unwrap();
    /// let c = tree.get_by_name("C").unwrap().id;
    /// let f = tree.get_root().unwrap();
    ///
    /// let names: Vec<_> = tree.neighbours_except(&c, Some(f))
    ///     .unwrap()
    ///     .iter()
    ///     .map(|id| tree.get(id).unwrap().name.clone())
    ///     .flatten()
    ///     .collect();
    /// assert_eq!(names, vec!["A", "B"]);
    /// ```
    pub fn neighbours_except(
        &self,
        id: &NodeId,
        banned: Option<NodeId>,
    ) -> Result<Vec<NodeId>, TreeError> {
        let node = self.get(id)?;

        Ok(node
            .parent
            .iter()
            .chain(node.children.iter())
            .copied()
            .filter(|neighbour| Some(*neighbour) != banned)
            .collect())
    }
}

/// Methods that compute characteristics of the [`Tree`]
///
/// ----
/// ----
impl Tree {
    // #######################################
    // # GETTING CHARACTERISTICS OF THE TREE #
    // #######################################

    /// Check if the tree is Binary
    pub fn is_binary(&self) -> Result<bool, TreeError> {
        for node in self.nodes.iter() {
            // The virtual root of unrooted trees can have up to 3 children
            if node.parent.is_none() {
                if self.is_rooted()? && node.children.len() > 2 {
                    return Ok(false);
                } else if !self.is_rooted()? && node.children.len() > 3 {
                    return Ok(false);
                }
            } else if node.children.len() > 2 {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Checks if the tree is rooted (i.e. the root node exists and has exactly 2 children)
    pub fn is_rooted(&self) -> Result<bool, TreeError> {
        let root_id = self.get_root()?;

        Ok(!self.nodes.is_empty() && self.get(&root_id)?.children.len() == 2)
    }

    /// Checks if all the tips have unique names
    pub fn has_unique_tip_names(&self) -> Result<bool, TreeError> {
        let mut names = HashSet::new();
        for name in self.get_leaf_names() {
            if let Some(name) = name {
                names.insert(name);
            } else {
                return Err(TreeError::UnnamedLeaves);
            }
        }

        Ok(names.len() == self.n_leaves())
    }

    /// Returns the number of nodes in the tree
    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the number of leaves in the tree
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|&node| node.is_tip()).count()
    }
}

/// Methods to read and write [`Tree`] objects to and from newick strings and files
///
/// ----
/// ----
impl Tree {
    // ########################
    // # READ AND WRITE TREES #
    // ########################

    /// Generate newick representation of tree
    fn to_newick_impl(&self, root: &NodeId) -> Result<String, TreeError> {
        let root = self.get(root)?;
        if root.children.is_empty() {
            Ok(root.to_newick())
        } else {
            let children: Result<Vec<_>, _> = root
                .children
                .iter()
                .map(|child_idx| self.to_newick_impl(child_idx))
                .collect();

            Ok(format!("({}){}", children?.join(","), root.to_newick()))
        }
    }

    /// Writes the tree as a newick formatted string
    /// # Example
    /// ```
    /// use tripletree::tree::Tree;
    ///
    /// let newick = "(A:0.1,B:0.2,(C:0.3,D:0.4)E:0.5)F;";
    /// let tree = Tree::from_newick(newick).unwrap();
    ///
    /// assert_eq!(tree.to_newick().unwrap(), newick);
    /// ```
    pub fn to_newick(&self) -> Result<String, TreeError> {
        let root = self.get_root()?;
        Ok(self.to_newick_impl(&root)? + ";")
    }

    /// Read a newick formatted string and build a [`Tree`] struct from it.
    /// Node names and branch lengths are supported, comments and quoted
    /// labels are not.
    /// # Example
    /// ```
    /// use tripletree::tree::Tree;
    ///
    /// let newick = "(A:0.1,B:0.2,(C:0.3,D:0.4)E:0.5)F;";
    /// let tree = Tree::from_newick(newick).unwrap();
    ///
    /// assert_eq!(tree.size(), 6);
    /// assert_eq!(tree.n_leaves(), 4);
    /// assert_eq!(tree.is_rooted().unwrap(), false);
    /// ```
    pub fn from_newick(newick: &str) -> Result<Self, NewickParseError> {
        #[derive(Debug, PartialEq)]
        enum Field {
            Name,
            Length,
        }

        let mut tree = Tree::new();

        let mut parsing = Field::Name;
        let mut current_name: Option<String> = None;
        let mut current_length: Option<String> = None;
        let mut current_index: Option<NodeId> = None;
        let mut parent_stack: Vec<NodeId> = Vec::new();

        let mut open_delimiters = Vec::new();

        for c in newick.chars() {
            if c.is_whitespace() {
                continue;
            }

            match c {
                '(' => {
                    // Start subtree
                    match parent_stack.last() {
                        None => parent_stack.push(tree.add(Node::new())),
                        Some(parent) => {
                            parent_stack.push(tree.add_child(Node::new(), *parent, None)?)
                        }
                    };
                    open_delimiters.push(0);
                }
                ':' => {
                    // Start parsing length
                    parsing = Field::Length;
                }
                ',' => {
                    // Add sibling
                    let index = match current_index {
                        Some(index) => index,
                        None => {
                            let parent = *parent_stack
                                .last()
                                .ok_or(NewickParseError::NoSubtreeParent)?;
                            tree.add_child(Node::new(), parent, None)?
                        }
                    };

                    let edge = current_length.take().map(|v| v.parse()).transpose()?;
                    let node = tree.get_mut(&index)?;
                    if let Some(name) = current_name.take() {
                        node.set_name(name);
                    }
                    if edge.is_some() {
                        node.parent_edge = edge;
                    }

                    current_index = None;
                    parsing = Field::Name;
                }
                ')' => {
                    // Close subtree
                    open_delimiters.pop();
                    let index = match current_index {
                        Some(index) => index,
                        None => {
                            let parent = *parent_stack
                                .last()
                                .ok_or(NewickParseError::NoSubtreeParent)?;
                            tree.add_child(Node::new(), parent, None)?
                        }
                    };

                    let edge = current_length.take().map(|v| v.parse()).transpose()?;
                    let node = tree.get_mut(&index)?;
                    if let Some(name) = current_name.take() {
                        node.set_name(name);
                    }
                    if edge.is_some() {
                        node.parent_edge = edge;
                    }

                    parsing = Field::Name;

                    current_index = Some(
                        parent_stack
                            .pop()
                            .ok_or(NewickParseError::NoSubtreeParent)?,
                    );
                }
                ';' => {
                    // Finish parsing the Tree
                    if !open_delimiters.is_empty() {
                        return Err(NewickParseError::UnclosedBracket);
                    }

                    let index = current_index.ok_or(NewickParseError::NoSubtreeParent)?;
                    let edge = current_length.take().map(|v| v.parse()).transpose()?;
                    let node = tree.get_mut(&index)?;
                    node.name = current_name.take();
                    if edge.is_some() {
                        node.parent_edge = edge;
                    }

                    return Ok(tree);
                }
                _ => {
                    // Parse characters in fields
                    match parsing {
                        Field::Name => current_name.get_or_insert_with(String::new).push(c),
                        Field::Length => current_length.get_or_insert_with(String::new).push(c),
                    };
                }
            }
        }

        Err(NewickParseError::NoClosingSemicolon)
    }

    /// Writes the tree to a newick file
    pub fn to_file(&self, path: &Path) -> Result<(), TreeError> {
        match fs::write(path, self.to_newick()?) {
            Ok(_) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Creates a tree from a newick file
    pub fn from_file(path: &Path) -> Result<Self, NewickParseError> {
        let newick_string = fs::read_to_string(path)?;
        Self::from_newick(&newick_string)
    }

    /// Recursive function that adds node representation to a printable tree builder
    fn print_nodes(&self, root_idx: &NodeId, output_tree: &mut TreeBuilder) -> Result<(), TreeError> {
        let root = self.get(root_idx)?;
        let label = format!("{root}");

        if root.children.is_empty() {
            output_tree.add_empty_child(label);
        } else {
            output_tree.begin_child(label);
            for child_idx in root.children.iter() {
                self.print_nodes(child_idx, output_tree)?;
            }
            output_tree.end_child();
        }

        Ok(())
    }

    /// Print the tree to the console
    pub fn print(&self) -> Result<(), TreeError> {
        let root = self.get_root()?;
        let mut builder = TreeBuilder::new(format!("{}", self.get(&root)?));
        for child_idx in self.get(&root)?.children.iter() {
            self.print_nodes(child_idx, &mut builder)?;
        }
        let tree = builder.build();
        print_tree(&tree)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    /// Generates example tree from the tree traversal wikipedia page
    /// https://en.wikipedia.org/wiki/Tree_traversal#Depth-first_search
    /// The difference is that I is the left child of G since this tree structure
    /// cannot represent a right child only.
    fn build_simple_tree() -> Result<Tree, TreeError> {
        let mut tree = Tree::new();
        tree.add(Node::new_named("F")); // 0
        tree.add_child(Node::new_named("B"), 0, None)?; // 1
        tree.add_child(Node::new_named("G"), 0, None)?; // 2
        tree.add_child(Node::new_named("A"), 1, None)?; // 3
        tree.add_child(Node::new_named("D"), 1, None)?; // 4
        tree.add_child(Node::new_named("I"), 2, None)?; // 5
        tree.add_child(Node::new_named("C"), 4, None)?; // 6
        tree.add_child(Node::new_named("E"), 4, None)?; // 7
        tree.add_child(Node::new_named("H"), 5, None)?; // 8

        Ok(tree)
    }

    fn get_values(indices: &[usize], tree: &Tree) -> Vec<Option<String>> {
        indices
            .iter()
            .map(|idx| tree.get(idx).unwrap().name.clone())
            .collect()
    }

    #[test]
    fn test_tips() {
        let mut tree = Tree::new();
        tree.add(Node::new_named("root"));
        assert_eq!(tree.get_leaves(), vec![0]);

        tree.add_child(Node::new_named("A"), 0, Some(0.1)).unwrap(); // 1
        tree.add_child(Node::new_named("B"), 0, Some(0.2)).unwrap(); // 2
        tree.add_child(Node::new_named("E"), 0, Some(0.5)).unwrap(); // 3

        assert_eq!(tree.get_leaves(), vec![1, 2, 3]);

        tree.add_child(Node::new_named("C"), 3, Some(0.3)).unwrap(); // 4
        tree.add_child(Node::new_named("D"), 3, Some(0.4)).unwrap(); // 5

        assert_eq!(tree.get_leaves(), vec![1, 2, 4, 5]);
    }

    #[test]
    fn traversals() {
        let tree = build_simple_tree().unwrap();
        let root = tree.get_root().unwrap();

        let preorder: Vec<_> = get_values(&tree.preorder(&root).unwrap(), &tree)
            .into_iter()
            .flatten()
            .collect();
        let postorder: Vec<_> = get_values(&tree.postorder(&root).unwrap(), &tree)
            .into_iter()
            .flatten()
            .collect();

        assert_eq!(preorder, vec!["F", "B", "A", "D", "C", "E", "G", "I", "H"]);
        assert_eq!(postorder, vec!["A", "C", "E", "D", "B", "H", "I", "G", "F"]);
    }

    #[test]
    fn binary_from_newick() {
        let test_cases = vec![
            ("((A,B,C)D,E)F;", false),   // Rooted non binary
            ("(A,B,(C,D)E)F;", true),    // Unrooted binary
            ("((D,E)B,(F,G)C)A;", true), // Rooted binary
        ];

        for (newick, is_binary) in test_cases {
            assert_eq!(
                Tree::from_newick(newick).unwrap().is_binary().unwrap(),
                is_binary
            )
        }
    }

    #[test]
    fn get_correct_leaves() {
        let tree = build_simple_tree().unwrap();
        let values: Vec<_> = get_values(&(tree.get_leaves()), &tree)
            .into_iter()
            .flatten()
            .collect();
        assert_eq!(values, vec!["A", "C", "E", "H"])
    }

    #[test]
    fn read_newick() {
        let newick_strings = vec![
            "((D,E)B,(F,G)C)A;",
            "(A:0.1,B:0.2,(C:0.3,D:0.4)E:0.5)F;",
            "(A:0.1,B:0.2,(C:0.3,D:0.4):0.5);",
            "(dog:20,(elephant:30,horse:60):20):50;",
            "(A,B,(C,D));",
            "(A,B,(C,D)E)F;",
            "(((One:0.2,Two:0.3):0.3,(Three:0.5,Four:0.3):0.2):0.3,Five:0.7):0;",
            "(:0.1,:0.2,(:0.3,:0.4):0.5);",
            "(A:0.1,B:0.2,(C:0.3,D:0.4)E:0.5)F;",
            "((B:0.2,(C:0.3,D:0.4)E:0.5)A:0.1)F;",
            "(,,(,));",
        ];
        for newick in newick_strings {
            let tree = Tree::from_newick(newick).unwrap();
            assert_eq!(newick, tree.to_newick().unwrap());
        }
    }

    #[test]
    fn read_newick_fails() {
        let newick_strings = vec![
            ("((D,E)B,(F,G,C)A;", NewickParseError::UnclosedBracket),
            ("((D,E)B,(F,G)C)A", NewickParseError::NoClosingSemicolon),
        ];
        for (newick, _error) in newick_strings {
            let tree = Tree::from_newick(newick);
            assert!(tree.is_err());
        }
    }

    #[test]
    fn unrooted_newick() {
        let tree = Tree::from_newick("(A,B,(C,D)E)F;").unwrap();
        assert!(!tree.is_rooted().unwrap());

        let tree = Tree::from_newick("((A,B)G,(C,D)E)F;").unwrap();
        assert!(tree.is_rooted().unwrap());
    }

    #[test]
    fn unique_tip_names() {
        let tree = Tree::from_newick("((A,B)G,(C,D)E)F;").unwrap();
        assert!(tree.has_unique_tip_names().unwrap());

        let tree = Tree::from_newick("((A,B)G,(C,A)E)F;").unwrap();
        assert!(!tree.has_unique_tip_names().unwrap());

        let tree = Tree::from_newick("((A,B)G,(C,)E)F;").unwrap();
        assert!(tree.has_unique_tip_names().is_err());
    }

    #[test]
    fn neighbours() {
        let tree = build_simple_tree().unwrap();

        // Children + parent in the undirected view
        let d = tree.get_by_name("D").unwrap().id;
        let names: Vec<_> = get_values(&tree.neighbours_except(&d, None).unwrap(), &tree)
            .into_iter()
            .flatten()
            .collect();
        assert_eq!(names, vec!["B", "C", "E"]);

        // Banned neighbour is excluded
        let b = tree.get_by_name("B").unwrap().id;
        let names: Vec<_> = get_values(&tree.neighbours_except(&d, Some(b)).unwrap(), &tree)
            .into_iter()
            .flatten()
            .collect();
        assert_eq!(names, vec!["C", "E"]);

        // Root has no parent to report
        let root = tree.get_root().unwrap();
        let names: Vec<_> = get_values(&tree.neighbours_except(&root, None).unwrap(), &tree)
            .into_iter()
            .flatten()
            .collect();
        assert_eq!(names, vec!["B", "G"]);
    }
}
