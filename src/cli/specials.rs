/// Handle special one-shot CLI commands like `--help` or `--version`.
/// Returns true if a special action was handled and the program should exit.
pub fn handle_specials_if_needed() -> bool {
    let arg = std::env::args().nth(1).unwrap_or_default();

    if matches!(arg.as_str(), "help" | "--help" | "-H" | "-h" | "-?") {
        println!(
            "{}",
            concat!(
                "llama-chat: talk to a Llama-2 chat model, locally or through Replicate\n\n",
                "  $ llama-chat                        # interactive chat\n",
                "  $ llama-chat what is a monad        # one message, one reply\n\n",
                "  LLAMA_CHAT_LOCAL=1                  run llama.cpp in-process\n",
                "  LOCAL_MODEL_PATH=path/to.gguf       weights (default: discovered)\n",
                "  REPLICATE_MODEL=owner/name[:ver]    remote model\n",
                "  REPLICATE_API_TOKEN=...             remote credentials\n",
                "  LLAMA_CHAT_HISTORY=5                messages per prompt\n",
                "  LLAMA_CHAT_SYSTEM_PROMPT=...        replace the system prompt"
            )
        );
        return true;
    }

    if matches!(arg.as_str(), "version" | "--version" | "-V" | "-v") {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return true;
    }

    false
}
