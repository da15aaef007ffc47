use clap::{Parser, Subcommand};
use std::path::PathBuf;

use tripletree::distr::Distr;

/// A command line tool to compare phylogenetic tree topologies with rooted triples
#[derive(Parser, Debug)]
pub struct Args {
    #[command(subcommand)]
    /// The command to execute
    pub command: Commands,
}

/// The available commands in the `tripletree` tool
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a random binary tree
    Generate {
        /// Number of tips in the generated tree
        #[arg(short, long, default_value_t = 20)]
        tips: usize,

        /// Generate random branch lengths
        #[arg(short, long)]
        branch_lengths: bool,

        /// Distribution of branch lengths
        #[arg(value_enum, short, long, default_value_t=Distr::Uniform)]
        distribution: Distr,

        /// Output file, stdout if absent
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compute the triple similarity between two trees, as is
    ///
    /// Both trees must be over the same taxa. The result is the fraction
    /// of rooted triples the two trees agree on, between 0 and 1.
    #[clap(verbatim_doc_comment)]
    Compare {
        /// Reference tree
        reftree: PathBuf,
        /// Tree to compare to reference
        tocompare: PathBuf,
    },

    /// Search every rooting of a tree for the best agreement with a reference
    ///
    /// The unrooted topology of the rerooted tree is kept fixed, only the
    /// root edge varies. Prints the best triple similarity found.
    #[clap(verbatim_doc_comment)]
    Root {
        /// Reference tree, its rooting is kept as is
        reftree: PathBuf,
        /// Tree whose rootings are searched
        toroot: PathBuf,
    },

    /// Display a tree in the terminal
    Show {
        /// Input newick file of the tree
        tree: PathBuf,
    },

    /// Sample the distribution of triple similarity between random trees
    ///
    /// Repeatedly generates two independent random binary trees over the
    /// same taxa and records their triple similarity. Prints one line per
    /// observed value of shared-triple count with its frequency.
    #[clap(verbatim_doc_comment)]
    Distrib {
        /// Number of tips in the generated trees
        #[arg(short, long, default_value_t = 10)]
        tips: usize,

        /// Number of random tree pairs to generate
        #[arg(short = 'n', long, default_value_t = 100_000)]
        trials: usize,
    },
}
