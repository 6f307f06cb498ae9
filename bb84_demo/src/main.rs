use anyhow::{Context, Result, bail};
use bb84_core::{
    KeyAgreementSession, KeySize, KeyedChannel, Message, QkdError, SessionConfig,
    SessionRegistry, SessionSummary, SharedKey, load_key, save_key, secure_source, session_preset,
};
use clap::{Parser, Subcommand, ValueEnum};
use env_logger::Env;
use hex::encode as hex_encode;
use log::{LevelFilter, debug};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

const ALICE_GREETING: &str = "Hello Bob! This is a secret message from Alice.";
const BOB_REPLY: &str = "Hi Alice! I received your secret message successfully!";

#[derive(Parser)]
#[command(
    name = "bb84-demo",
    author,
    version,
    about = "BB84 key agreement and keyed XOR channel (demonstration only, not secure)"
)]
struct Cli {
    #[arg(long, global = true)]
    debug: bool,
    #[arg(long, global = true, value_enum, default_value = "standard")]
    size: KeySizeArg,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum KeySizeArg {
    Toy,
    Standard,
    Extended,
}

impl From<KeySizeArg> for KeySize {
    fn from(arg: KeySizeArg) -> Self {
        match arg {
            KeySizeArg::Toy => KeySize::Toy,
            KeySizeArg::Standard => KeySize::Standard,
            KeySizeArg::Extended => KeySize::Extended,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run a key agreement and let Alice and Bob exchange two messages.
    Demo {
        #[arg(long, value_name = "N")]
        bits: Option<usize>,
    },
    /// Run a key agreement and write the sifted key to disk.
    Keygen {
        #[arg(long, value_name = "N")]
        bits: Option<usize>,
        #[arg(long, value_name = "FILE")]
        out: PathBuf,
    },
    /// Scramble a message with a stored key and emit the message JSON.
    Encrypt {
        #[arg(long, value_name = "FILE")]
        key: PathBuf,
        #[arg(long, value_name = "TEXT")]
        message: Option<String>,
        #[arg(long, value_name = "FILE")]
        input: Option<PathBuf>,
        #[arg(long, default_value = "Alice")]
        sender: String,
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Recover a message produced by `encrypt`.
    Decrypt {
        #[arg(long, value_name = "FILE")]
        key: PathBuf,
        #[arg(long, value_name = "BASE64")]
        ciphertext: Option<String>,
        #[arg(long, value_name = "FILE")]
        cipher: Option<PathBuf>,
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Replay `sender: text` lines through one session and list the history.
    Chat {
        #[arg(long, value_name = "N")]
        bits: Option<usize>,
        #[arg(long, value_name = "FILE")]
        script: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);
    let preset = session_preset(cli.size.into());
    match cli.command {
        Commands::Demo { bits } => cmd_demo(config_for(&preset, bits)),
        Commands::Keygen { bits, out } => cmd_keygen(config_for(&preset, bits), out),
        Commands::Encrypt {
            key,
            message,
            input,
            sender,
            out,
        } => cmd_encrypt(key, message, input, sender, out),
        Commands::Decrypt {
            key,
            ciphertext,
            cipher,
            out,
        } => cmd_decrypt(key, ciphertext, cipher, out),
        Commands::Chat { bits, script } => cmd_chat(config_for(&preset, bits), script),
    }
}

fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or(default));
    builder.format_timestamp(None);
    if debug {
        builder.filter_level(LevelFilter::Debug);
    }
    let _ = builder.try_init();
}

fn config_for(preset: &SessionConfig, bits: Option<usize>) -> SessionConfig {
    match bits {
        Some(n) => SessionConfig {
            requested_bits: n,
            ..preset.clone()
        },
        None => preset.clone(),
    }
}

fn cmd_demo(config: SessionConfig) -> Result<()> {
    let registry = SessionRegistry::new();
    let key = registry.initialize_with(&config, &mut secure_source())?;
    print_report(&registry.summary()?);
    debug!("demo channel key={} ({} bits)", hex_encode(key.to_bytes()), key.len());

    println!("\n=== Secure Message Exchange ===");
    let sent = with_rerun_hint(
        registry.encrypt(ALICE_GREETING, &config.sender_name),
        config.requested_bits,
    )?;
    println!("\n{}'s original message: {}", config.sender_name, ALICE_GREETING);
    println!("Encrypted message: {}", sent.ciphertext);
    let received = registry.decrypt(&sent.ciphertext)?;
    println!("{} decrypted the message: {}", config.receiver_name, received);

    let reply = registry.encrypt(BOB_REPLY, &config.receiver_name)?;
    println!("\n{}'s original message: {}", config.receiver_name, BOB_REPLY);
    println!("Encrypted reply: {}", reply.ciphertext);
    let answered = registry.decrypt(&reply.ciphertext)?;
    println!("{} decrypted the reply: {}", config.sender_name, answered);
    Ok(())
}

fn print_report(summary: &SessionSummary) {
    println!("\n=== QKD Protocol Results ===");
    println!("Initial number of bits: {}", summary.requested_bits);
    println!("Final key length: {}", summary.key_length);
    println!("Error rate: {:.2}%", summary.error_rate * 100.0);
}

fn cmd_keygen(config: SessionConfig, out: PathBuf) -> Result<()> {
    let session = KeyAgreementSession::run_with_config(&config, &mut secure_source())?;
    print_report(&session.summary());
    debug!(
        "bases {}={} {}={}",
        session.alice().name(),
        session.alice().basis_string(),
        session.bob().name(),
        session.bob().basis_string()
    );
    let key = session.shared_key();
    if key.is_empty() {
        bail!("key agreement kept no bits; request more than {}", config.requested_bits);
    }
    save_key(&out, key).with_context(|| format!("writing key to {}", out.display()))?;
    println!("Wrote {}-bit key to {}", key.len(), out.display());
    println!("Key (hex): {}", hex_encode(key.to_bytes()));
    Ok(())
}

fn cmd_encrypt(
    key_path: PathBuf,
    message: Option<String>,
    input: Option<PathBuf>,
    sender: String,
    out: Option<PathBuf>,
) -> Result<()> {
    let key = read_key(&key_path)?;
    let plaintext = resolve_plaintext(message, input)?;
    let mut channel = KeyedChannel::new(key);
    let sealed = channel.encrypt(&plaintext, &sender)?;
    debug!(
        "encrypt cmd sender={} plaintext_len={} key_bits={}",
        sender,
        plaintext.len(),
        channel.key().len()
    );
    match out {
        Some(path) => {
            save_json(&path, "message", &sealed)?;
            println!("Wrote message from {} to {}", sealed.sender, path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&sealed)?),
    }
    Ok(())
}

fn cmd_decrypt(
    key_path: PathBuf,
    ciphertext: Option<String>,
    cipher: Option<PathBuf>,
    out: Option<PathBuf>,
) -> Result<()> {
    let key = read_key(&key_path)?;
    let ciphertext = match (ciphertext, cipher) {
        (Some(text), None) => text,
        (None, Some(path)) => load_json::<Message>(&path, "message")?.ciphertext,
        (Some(_), Some(_)) => bail!("Provide either --ciphertext or --cipher, not both."),
        (None, None) => bail!("Provide --ciphertext BASE64 or --cipher FILE to decrypt."),
    };
    let plaintext = KeyedChannel::new(key).decrypt(ciphertext.trim())?;
    match out {
        Some(path) => {
            fs::write(&path, &plaintext)
                .with_context(|| format!("writing plaintext to {}", path.display()))?;
            println!(
                "Recovered {} bytes and wrote them to {}",
                plaintext.len(),
                path.display()
            );
        }
        None => {
            println!("Recovered plaintext ({} bytes):", plaintext.len());
            println!("{}", String::from_utf8_lossy(&plaintext));
        }
    }
    Ok(())
}

fn cmd_chat(config: SessionConfig, script: PathBuf) -> Result<()> {
    let lines = load_script(&script)?;
    let registry = SessionRegistry::new();
    let key = registry.initialize_with(&config, &mut secure_source())?;
    println!(
        "Session ready: {} of {} bits kept",
        key.len(),
        config.requested_bits
    );
    for (sender, text) in &lines {
        with_rerun_hint(registry.encrypt(text, sender), config.requested_bits)?;
    }
    for (idx, message) in registry.list_messages()?.iter().enumerate() {
        let plaintext = registry.decrypt(&message.ciphertext)?;
        println!(
            "#{idx} {}: {} -> '{}'",
            message.sender, message.ciphertext, plaintext
        );
    }
    Ok(())
}

/// Points the user at a larger run when the session produced no usable key.
fn with_rerun_hint<T>(result: Result<T, QkdError>, requested_bits: usize) -> Result<T> {
    result.map_err(|err| {
        if err.needs_reinitialize() {
            let hint = format!(
                "key agreement over {requested_bits} bits left no usable key; \
                 re-run with a larger --bits"
            );
            anyhow::Error::new(err).context(hint)
        } else {
            err.into()
        }
    })
}

fn read_key(path: &Path) -> Result<SharedKey> {
    load_key(path).with_context(|| format!("reading key from {}", path.display()))
}

fn resolve_plaintext(message: Option<String>, input: Option<PathBuf>) -> Result<Vec<u8>> {
    match (message, input) {
        (Some(text), None) => Ok(text.into_bytes()),
        (None, Some(path)) => {
            fs::read(&path).with_context(|| format!("reading plaintext from {}", path.display()))
        }
        (Some(_), Some(_)) => bail!("Provide either --message or --input, not both."),
        (None, None) => bail!("Provide --message TEXT or --input FILE for data to encrypt."),
    }
}

/// Reads `sender: text` lines; blank lines and `#` comments are skipped.
fn load_script(path: &Path) -> Result<Vec<(String, String)>> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading chat script from {}", path.display()))?;
    let mut lines = Vec::new();
    for (number, line) in data.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((sender, text)) = line.split_once(':') else {
            bail!("{}:{}: expected 'sender: text'", path.display(), number + 1);
        };
        lines.push((sender.trim().to_string(), text.trim().to_string()));
    }
    Ok(lines)
}

fn load_json<T: DeserializeOwned>(path: &Path, label: &str) -> Result<T> {
    let data =
        fs::read(path).with_context(|| format!("reading {} from {}", label, path.display()))?;
    let value = serde_json::from_slice(&data)
        .with_context(|| format!("parsing {} from {}", label, path.display()))?;
    Ok(value)
}

fn save_json<T: ?Sized + serde::Serialize>(path: &Path, label: &str, value: &T) -> Result<()> {
    let serialized = serde_json::to_string_pretty(value)?;
    fs::write(path, serialized)
        .with_context(|| format!("writing {} to {}", label, path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn empty_key_gets_rerun_hint() {
        let registry = SessionRegistry::new();
        registry
            .initialize_with(&SessionConfig::new(0), &mut secure_source())
            .unwrap();
        let err = with_rerun_hint(registry.encrypt("hi", "Alice"), 0).unwrap_err();
        let text = format!("{err:#}");
        assert!(text.contains("re-run with a larger --bits"), "{text}");
        assert!(text.contains("shared key is empty"), "{text}");
    }

    #[test]
    fn other_errors_pass_through_unchanged() {
        let registry = SessionRegistry::new();
        registry
            .initialize_with(&SessionConfig::new(64), &mut secure_source())
            .unwrap();
        let err = with_rerun_hint(registry.decrypt("not base64!"), 64).unwrap_err();
        let text = format!("{err:#}");
        assert!(!text.contains("re-run"), "{text}");
        assert!(text.starts_with("ciphertext is not valid base64"), "{text}");
    }

    #[test]
    fn chat_script_parses_senders() {
        let script = NamedTempFile::new().unwrap();
        fs::write(
            script.path(),
            "# greeting\nAlice: hello: there\n\nBob:hi\n",
        )
        .unwrap();
        let lines = load_script(script.path()).unwrap();
        assert_eq!(
            lines,
            vec![
                ("Alice".to_string(), "hello: there".to_string()),
                ("Bob".to_string(), "hi".to_string()),
            ]
        );
    }

    #[test]
    fn chat_script_rejects_bare_lines() {
        let script = NamedTempFile::new().unwrap();
        fs::write(script.path(), "no sender here\n").unwrap();
        assert!(load_script(script.path()).is_err());
    }

    #[test]
    fn message_file_roundtrip_through_key_file() {
        let key_file = NamedTempFile::new().unwrap();
        let key: SharedKey = "110100111".parse().unwrap();
        save_key(key_file.path(), &key).unwrap();

        let message_file = NamedTempFile::new().unwrap();
        let sealed = KeyedChannel::new(read_key(key_file.path()).unwrap())
            .encrypt(b"over the wire", "Alice")
            .unwrap();
        save_json(message_file.path(), "message", &sealed).unwrap();

        let loaded: Message = load_json(message_file.path(), "message").unwrap();
        let plaintext = KeyedChannel::new(key).decrypt(&loaded.ciphertext).unwrap();
        assert_eq!(plaintext, b"over the wire");
    }

    #[test]
    fn explicit_bits_override_preset() {
        let preset = session_preset(KeySize::Toy);
        assert_eq!(config_for(&preset, None).requested_bits, 32);
        assert_eq!(config_for(&preset, Some(10)).requested_bits, 10);
    }

    #[test]
    fn resolve_plaintext_needs_exactly_one_source() {
        assert!(resolve_plaintext(None, None).is_err());
        assert!(resolve_plaintext(Some("a".into()), Some(PathBuf::from("b"))).is_err());
        assert_eq!(resolve_plaintext(Some("a".into()), None).unwrap(), b"a");
    }
}
