#![warn(missing_docs)]
//! The `tripletree` binary is a command line tool using the [`tripletree`] crate.
//! It compares phylogenetic tree topologies through their rooted triples,
//! directly in the terminal.

use clap::Parser;
use indicatif::ProgressIterator;
use tripletree::{
    distr::Distr,
    generate_tree,
    tree::Tree,
    triple::{optimise_tree_triple_similarity, tree_triple_similarity},
};

/// Contains the struct representing the command line arguments
/// parsed by [`clap`] and used to execute this binary
pub mod cli;

fn choose_3(n: usize) -> usize {
    n * (n - 1) * (n - 2) / 6
}

fn main() {
    match cli::Args::parse().command {
        cli::Commands::Generate {
            tips,
            branch_lengths,
            distribution,
            output,
        } => {
            let random = generate_tree(tips, branch_lengths, distribution).unwrap();
            if let Some(output) = output {
                random.to_file(&output).unwrap()
            } else {
                println!("{}", random.to_newick().unwrap())
            }
        }
        cli::Commands::Compare { reftree, tocompare } => {
            let reference = Tree::from_file(&reftree).unwrap();
            let compared = Tree::from_file(&tocompare).unwrap();

            let similarity = tree_triple_similarity(&reference, &compared).unwrap();
            println!("{similarity}")
        }
        cli::Commands::Root { reftree, toroot } => {
            let reference = Tree::from_file(&reftree).unwrap();
            let rerootable = Tree::from_file(&toroot).unwrap();

            let best = optimise_tree_triple_similarity(&reference, &rerootable).unwrap();
            println!("{best}")
        }
        cli::Commands::Show { tree } => {
            let tree = Tree::from_file(&tree).unwrap();
            println!(
                "{} nodes, {} tips, rooted: {}",
                tree.size(),
                tree.n_leaves(),
                tree.is_rooted().unwrap()
            );
            tree.print().unwrap()
        }
        cli::Commands::Distrib { tips, trials } => {
            let possibilities = choose_3(tips);
            let mut counts = vec![0_usize; possibilities + 1];

            for _ in (0..trials).progress() {
                let tree_1 = generate_tree(tips, false, Distr::Uniform).unwrap();
                let tree_2 = generate_tree(tips, false, Distr::Uniform).unwrap();

                let similarity = tree_triple_similarity(&tree_1, &tree_2).unwrap();
                let shared = (similarity * possibilities as f64).round() as usize;
                counts[shared] += 1;
            }

            println!("shared\tsimilarity\tcount");
            for (shared, count) in counts.iter().enumerate() {
                println!(
                    "{shared}\t{:.6}\t{count}",
                    shared as f64 / possibilities as f64
                );
            }
        }
    }
}
