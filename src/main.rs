fn main() -> anyhow::Result<()> {
    flag_reaction_lib::run()
}
