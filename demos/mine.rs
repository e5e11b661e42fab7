use clap::{Parser, Subcommand, ValueEnum};

use redescription_rs::config::{SearchVariant, TreeSearchConfig};
use redescription_rs::dataset::{Column, Data};
use redescription_rs::display::RenderStyle;
use redescription_rs::fit::{CartFitter, SplitCriterion};
use redescription_rs::query::Query;
use redescription_rs::search::TreeSearch;
use redescription_rs::types::Side;

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level.
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log: simplelog::LevelFilter,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Normalize a query given in text form.
    Normalize {
        /// Query, e.g. "v0 | (v0 & v1)".
        query: String,

        /// Output style.
        #[arg(long, value_enum, default_value = "plain")]
        style: Style,

        /// Also print the compacted tree in DOT format.
        #[arg(long)]
        dot: bool,
    },
    /// Run the tree search on a synthetic two-sided dataset.
    Search {
        /// Number of rows.
        #[arg(long, value_name = "INT", default_value = "40")]
        rows: usize,

        #[arg(long, value_enum, default_value = "cartwheel")]
        variant: Variant,

        /// Maximal number of tree fits.
        #[arg(long, value_name = "INT", default_value = "10")]
        rounds: usize,

        /// Depth cap on both sides.
        #[arg(long, value_name = "INT", default_value = "3")]
        depth: usize,

        /// Minimal leaf size.
        #[arg(long, value_name = "INT", default_value = "2")]
        min_leaf: usize,

        /// Use the entropy criterion instead of Gini.
        #[arg(long)]
        entropy: bool,
    },
}

#[derive(Debug, Copy, Clone, ValueEnum)]
enum Style {
    Plain,
    Math,
    Tex,
}

impl From<Style> for RenderStyle {
    fn from(style: Style) -> Self {
        match style {
            Style::Plain => RenderStyle::Plain,
            Style::Math => RenderStyle::Math,
            Style::Tex => RenderStyle::Tex,
        }
    }
}

#[derive(Debug, Copy, Clone, ValueEnum)]
enum Variant {
    Cartwheel,
    Sprit,
    Split,
}

impl From<Variant> for SearchVariant {
    fn from(variant: Variant) -> Self {
        match variant {
            Variant::Cartwheel => SearchVariant::Cartwheel,
            Variant::Sprit => SearchVariant::Sprit,
            Variant::Split => SearchVariant::Split,
        }
    }
}

fn synthetic(n: usize) -> color_eyre::Result<Data> {
    let mut data = Data::new(n);
    data.add_column(Side::Left, "x", Column::Numerical((0..n).map(|i| Some(i as f64)).collect()))?;
    data.add_column(Side::Left, "third", Column::Boolean((0..n).map(|i| Some(i % 3 == 0)).collect()))?;
    data.add_column(
        Side::Right,
        "twice",
        Column::Numerical((0..n).map(|i| if i % 11 == 5 { None } else { Some(2.0 * i as f64) }).collect()),
    )?;
    data.add_column(
        Side::Right,
        "bucket",
        Column::Categorical((0..n).map(|i| Some(["low", "mid", "high"][3 * i / n.max(1)].to_string())).collect()),
    )?;
    data.add_column(Side::Right, "scramble", Column::Numerical((0..n).map(|i| Some(((i * 7) % n) as f64)).collect()))?;
    Ok(data)
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Cli::parse();

    simplelog::TermLogger::init(
        args.log,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    match args.command {
        Command::Normalize { query, style, dot } => {
            let q = Query::parse(&query)?;
            println!("parsed     = {}", q.render(style.into(), None));
            println!("negated    = {}", q.negate().render(style.into(), None));
            let (normalized, changed) = q.algebraic_normalize();
            println!("normalized = {} (changed: {})", normalized.render(style.into(), None), changed);
            if dot {
                match normalized.to_qtree() {
                    Some(tree) => {
                        println!("{}", tree);
                        println!("{}", tree.to_dot()?);
                    }
                    None => println!("normalized query is not in tree form"),
                }
            }
        }
        Command::Search {
            rows,
            variant,
            rounds,
            depth,
            min_leaf,
            entropy,
        } => {
            let data = synthetic(rows)?;
            let config = TreeSearchConfig {
                variant: variant.into(),
                max_rounds: rounds,
                max_depth: [depth, depth],
                min_leaf_size: min_leaf,
                criterion: if entropy {
                    SplitCriterion::Entropy
                } else {
                    SplitCriterion::Gini
                },
                ..TreeSearchConfig::default()
            };
            println!("config = {:?}", config);

            let seed = Query::parse(&format!("0 <= v0 <= {}", rows / 2))?;
            println!("seed = {}", seed);

            let time_search = std::time::Instant::now();
            let outcome = TreeSearch::new(&data, CartFitter, config).run(Side::Left, &seed);
            println!(
                "{:?} after {} rounds in {:.3}s",
                outcome.termination,
                outcome.rounds,
                time_search.elapsed().as_secs_f64()
            );
            match outcome.best {
                Some(red) => {
                    for side in Side::BOTH {
                        println!(
                            "{} = {}",
                            side,
                            red.query(side).render(RenderStyle::Math, Some(data.names(side)))
                        );
                    }
                    println!("jaccard = {:.4}", red.jaccard);
                }
                None => println!("no redescription found"),
            }
        }
    }

    Ok(())
}
