use clap::Parser;
use icap_wire::client::service_from_uri;
use icap_wire::error::IcapResult;
use icap_wire::{Client, Request, Response, SectionKind};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "icap-wire-client",
    about = "ICAP client built on icap-wire",
    disable_version_flag = true,
    long_about = "Sends OPTIONS, REQMOD or RESPMOD requests with a c-icap-client-like CLI"
)]
struct Args {
    /// Full ICAP URI like icap://host[:port]/service
    #[arg(short = 'u', long, default_value = "icap://127.0.0.1:1344/")]
    uri: String,

    /// ICAP method: OPTIONS|REQMOD|RESPMOD
    #[arg(long = "method")]
    method: Option<String>,

    /// Send this file as the body section (implies REQMOD if method not set)
    #[arg(short = 'f', long)]
    filename: Option<String>,

    /// Send this raw HTTP header block as the header section
    #[arg(long = "hdr")]
    hdr: Option<String>,

    /// Extra ICAP headers (repeatable): -x "Header: Value"
    #[arg(short = 'x', long)]
    xheader: Vec<String>,

    /// Print the generated ICAP request without sending it
    #[arg(long = "print-request", action = clap::ArgAction::SetTrue)]
    print_request: bool,

    /// Print ICAP response headers
    #[arg(short = 'v', long, action = clap::ArgAction::SetTrue)]
    verbose: bool,

    /// Save the decoded response body to file (default: stdout)
    #[arg(short = 'o', long)]
    output: Option<String>,

    /// Debug level 0..5 (0 is silent)
    #[arg(short = 'd', long)]
    debug_level: Option<u8>,
}

#[tokio::main]
async fn main() -> IcapResult<()> {
    let args = Args::parse();

    let debug_level = args.debug_level.unwrap_or(0);
    if debug_level > 0 {
        tracing_subscriber::fmt()
            .with_max_level(match debug_level {
                1 => tracing::Level::ERROR,
                2 => tracing::Level::WARN,
                3 => tracing::Level::INFO,
                4 => tracing::Level::DEBUG,
                _ => tracing::Level::TRACE,
            })
            .init();
    }
    debug!("Arguments: {:?}", args);

    let method = match &args.method {
        Some(m) => m.to_uppercase(),
        None if args.filename.is_some() => "REQMOD".to_string(),
        None => "OPTIONS".to_string(),
    };

    let client = Client::from_uri(&args.uri)?;
    let service = service_from_uri(&args.uri).unwrap_or_default();

    let mut req = Request::new(method.as_str(), service);
    for h in &args.xheader {
        match h.split_once(':') {
            Some((k, v)) => req = req.header(k.trim(), v.trim()),
            None => warn!("Bad -x header format (use \"Name: Value\"): '{}'", h),
        }
    }

    if req.is_mod() {
        let (hdr_kind, body_kind) = if method == "RESPMOD" {
            (SectionKind::ResHdr, SectionKind::ResBody)
        } else {
            (SectionKind::ReqHdr, SectionKind::ReqBody)
        };
        if let Some(path) = &args.hdr {
            let bytes = read_file(path).await?;
            debug!("Header section from {}: {} bytes", path, bytes.len());
            req = req.part(hdr_kind, bytes);
        }
        if let Some(path) = &args.filename {
            let bytes = read_file(path).await?;
            debug!("Body section from {}: {} bytes", path, bytes.len());
            req = req.part(body_kind, bytes);
        }
    } else if args.hdr.is_some() || args.filename.is_some() {
        warn!("{} carries no encapsulated sections; --hdr and -f are ignored", method);
    }

    if args.print_request {
        print!("{}", String::from_utf8_lossy(&client.get_request(&req)));
        return Ok(());
    }

    info!("Sending {} to {}", method, args.uri);
    let response = client.send(&req).await.inspect_err(|e| {
        error!("ICAP request failed: {}", e);
    })?;

    println!(
        "{} {} {}",
        response.version, response.status_code, response.status_text
    );
    if args.verbose {
        print!("{}", response.headers);
        println!();
    }

    let body = response_body(&response);
    if let Some(output_file) = &args.output {
        let mut file = File::create(output_file).await?;
        file.write_all(body).await?;
        info!("Response body written to file: {}", output_file);
    } else {
        print!("{}", String::from_utf8_lossy(body));
    }

    Ok(())
}

async fn read_file(path: &str) -> IcapResult<Vec<u8>> {
    fs::read(path).await.map_err(|e| {
        error!("Failed to read file {}: {}", path, e);
        e.into()
    })
}

/// Decoded body section if the server returned one, the raw body otherwise.
fn response_body(response: &Response) -> &[u8] {
    [SectionKind::ResBody, SectionKind::ReqBody]
        .into_iter()
        .find_map(|kind| response.section(kind))
        .unwrap_or(response.raw_body.as_slice())
}
