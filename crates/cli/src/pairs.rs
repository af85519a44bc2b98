use quotebench_core::{chain::ChainId, registry::ChainRegistry};

use color_eyre::eyre;

#[derive(clap::Args, Debug)]
pub(crate) struct Pairs {
    /// Chain id to list pairs for
    #[arg(long)]
    pub(crate) chain: String,
}

impl Pairs {
    pub(crate) fn run(&self, registry: &ChainRegistry) -> eyre::Result<()> {
        let id = ChainId::from(self.chain.as_str());
        let chain = registry.chain(&id)?;

        let pairs = registry.pairs_for(&id);
        for pair in &pairs {
            println!("{:<16} {} -> {}", pair.name, pair.input.address, pair.output.address);
        }
        println!("{} pairs on {}", pairs.len(), chain);

        Ok(())
    }
}
