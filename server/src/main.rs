mod capture;
mod config;
mod console;
mod logging;
pub use config::Config;

use capture::PictureSink;
use console::Command;
use common::constants::DEFAULT_MAX_FRAME_LEN;
use controller::{
    Controller,
    ControllerConfig,
    InformEvent,
    QueueHandler,
    RequestCode,
    ResponseCode,
    Role,
};
use crossbeam_channel::{bounded, never, select, unbounded, Receiver};
use log::{debug, error, info, warn};
use std::{
    fs,
    net::{Ipv4Addr, SocketAddr},
};

fn main() {
    let config = match Config::get_or_try_init() {
        Ok(config) => config,
        Err(error) => {
            eprintln!("Failed to initialize config: {error}");
            return;
        }
    };

    if let Err(error) = logging::init_logger() {
        eprintln!("Failed to initialize logger: {error}");
        return;
    }

    let (event_tx, event_rx) = unbounded();
    let controller_config = ControllerConfig {
        addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.control_port)),
        negotiation_timeout: config.negotiation_timeout,
        max_frame_len: DEFAULT_MAX_FRAME_LEN,
    };

    info!("Starting controller...");
    let controller = match Controller::start(controller_config, QueueHandler::new(event_tx)) {
        Ok(controller) => controller,
        Err(error) => {
            error!("Failed to bind port {}: {error}", config.control_port);
            logging::cleanup();
            return;
        }
    };

    let shutdown = shutdown_hook();
    let mut commands = Some(console::spawn_reader());
    let mut pictures = PictureSink::new(config.capture_dir.clone());

    loop {
        // Without a console the loop only waits for events and ctrl-c
        let console = commands.clone().unwrap_or_else(never);

        select! {
            recv(event_rx) -> event => match event {
                Ok(event) => handle_event(&mut pictures, event),
                Err(_) => break,
            },
            recv(console) -> command => match command {
                Ok(Command::Quit) => break,
                Ok(command) => run_command(&controller, command),
                Err(_) => {
                    info!("Console closed");
                    commands = None;
                }
            },
            recv(shutdown) -> _ => break,
        }
    }

    info!("Shutting down...");
    controller.shutdown();
    for event in event_rx.try_iter() {
        handle_event(&mut pictures, event);
    }

    drop(controller);
    logging::cleanup();
    println!();
}

/// Returns a receiver which becomes ready on ctrl-c. If the hook can't be installed the sender is
/// dropped and the receiver is ready immediately.
pub fn shutdown_hook() -> Receiver<()> {
    let (tx, rx) = bounded::<()>(1);

    let set_handler_result = ctrlc::set_handler(move || {
        let _ = tx.try_send(());
    });

    if let Err(error) = set_handler_result {
        error!("Failed to set shutdown hook: {error}");
    }

    rx
}

fn run_command(controller: &Controller, command: Command) {
    let request = match command.request() {
        Some(request) => request,
        None => return,
    };

    let payload = match &command {
        Command::Show(path) => match fs::read(path) {
            Ok(picture) => picture,
            Err(error) => {
                warn!("Failed to read {}: {}", path.display(), error);
                return;
            }
        },
        _ => Vec::new(),
    };

    match controller.request(request, payload) {
        Ok((role, request_id)) => debug!("Sent {:?} to the {} as {}", request, role, request_id),
        Err(error) => warn!("Failed to send {:?}: {}", request, error),
    }
}

fn handle_event(pictures: &mut PictureSink, event: InformEvent) {
    match event {
        InformEvent::Connected(role) => info!("The {} is online", role),
        InformEvent::Disconnected(role) => info!("The {} went offline", role),
        InformEvent::RequestHandled {
            role,
            request,
            response,
        } => info!(
            "The {} asked for {:?}, answered {:?}",
            role, request.request, response
        ),
        InformEvent::Response { role, response } => {
            debug!(
                "The {} answered {:?} with {:?} ({} byte payload)",
                role,
                response.request,
                response.response,
                response.payload.len()
            );

            if is_picture(role, response.request)
                && response.response == ResponseCode::Ok
                && !response.payload.is_empty()
            {
                match pictures.save(&response.payload) {
                    Ok(path) => info!("Saved picture from the {} to {}", role, path.display()),
                    Err(error) => warn!("Failed to save picture from the {}: {}", role, error),
                }
            } else if response.response != ResponseCode::Ok && response.response != ResponseCode::Ack
            {
                warn!(
                    "The {} answered {:?} with {:?}",
                    role, response.request, response.response
                );
            }
        }
    }
}

fn is_picture(role: Role, request: RequestCode) -> bool {
    matches!(
        (role, request),
        (Role::Camera, RequestCode::CameraTakePicture)
            | (Role::Display, RequestCode::DisplayTakePicture)
    )
}
