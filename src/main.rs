mod api;
mod config;
mod conversation;
mod error;
mod history;
mod logging;
mod progress;
mod render;
mod session;

use iced::{
    task,
    widget::{button, column, container, row, scrollable, text, text_input, text_input::Id, Column},
    Element, Length, Task, Theme, Font, Subscription, Size,
    time, clipboard,
    keyboard::{self, Key},
    event::{self, Event as IcedEvent},
    alignment,
    window,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::api::{QaClient, UPLOAD_FALLBACK_ERROR};
use crate::config::{Config, Variant};
use crate::conversation::{Answer, Entry, MessageId, TurnBody};
use crate::error::ApiError;
use crate::render::ResultView;
use crate::session::{ChatSession, Outcome};

fn main() -> iced::Result {
    logging::init();
    let config = Config::load();
    let size = Size::new(config.window.width as f32, config.window.height as f32);
    let min_size = Size::new(config.window.min_width as f32, config.window.min_height as f32);

    iced::application("Database Chat Analyzer", App::update, App::view)
        .theme(App::theme)
        .subscription(App::subscription)
        .window(window::Settings {
            size,
            min_size: Some(min_size),
            position: window::Position::Centered,
            ..Default::default()
        })
        .default_font(Font::MONOSPACE)
        .run_with(move || App::new(config))
}

#[derive(Debug, Clone)]
enum Message {
    PathChanged(String),
    Upload,
    Uploaded(Result<String, String>),
    InputChanged(String),
    Submit,
    Settled(Outcome),
    ToggleDetails(MessageId),
    CopySql(MessageId),
    NewDatabase,
    Tick,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Upload,
    Chat,
}

struct App {
    config: Config,
    client: Arc<QaClient>,
    screen: Screen,
    upload_path: String,
    upload_status: Option<String>,
    uploading: bool,
    session: ChatSession,
    /// The running question, aborted when the session is torn down.
    request: Option<task::Handle>,
    input_text: String,
    input_id: Id,
    path_id: Id,
    log_id: scrollable::Id,
}

fn upload_error_text(e: ApiError) -> String {
    warn!("upload failed: {}", e);
    if e.is_transport() {
        UPLOAD_FALLBACK_ERROR.to_string()
    } else {
        e.to_string()
    }
}

impl App {
    fn new(config: Config) -> (Self, Task<Message>) {
        let client = Arc::new(QaClient::with_config(&config.server));
        let session = ChatSession::new(client.clone(), config.chat.session_options());
        let path_id = Id::unique();

        let app = App {
            config,
            client,
            screen: Screen::Upload,
            upload_path: String::new(),
            upload_status: None,
            uploading: false,
            session,
            request: None,
            input_text: String::new(),
            input_id: Id::unique(),
            path_id: path_id.clone(),
            log_id: scrollable::Id::unique(),
        };

        (app, text_input::focus(path_id))
    }

    /// Replace the current conversation with an empty one, stopping anything
    /// the old one still had running.
    fn reset_session(&mut self) {
        self.stop_session();
        self.session = ChatSession::new(self.client.clone(), self.config.chat.session_options());
        self.input_text.clear();
    }

    fn stop_session(&mut self) {
        self.session.shutdown();
        if let Some(request) = self.request.take() {
            request.abort();
        }
    }

    fn scroll_to_end(&self) -> Task<Message> {
        scrollable::snap_to(self.log_id.clone(), scrollable::RelativeOffset::END)
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::PathChanged(value) => {
                self.upload_path = value;
                Task::none()
            }
            Message::Upload => {
                let path = self.upload_path.trim();
                if path.is_empty() || self.uploading {
                    return Task::none();
                }

                let path = PathBuf::from(path);
                self.uploading = true;
                self.upload_status = None;
                let client = self.client.clone();

                Task::future(async move {
                    let result = client.upload(&path).await;
                    Message::Uploaded(result.map_err(upload_error_text))
                })
            }
            Message::Uploaded(result) => {
                self.uploading = false;
                match result {
                    Ok(status) => {
                        info!("database uploaded: {}", status);
                        self.upload_status = Some(status);
                        self.reset_session();
                        self.screen = Screen::Chat;
                        text_input::focus(self.input_id.clone())
                    }
                    Err(status) => {
                        self.upload_status = Some(status);
                        Task::none()
                    }
                }
            }
            Message::InputChanged(value) => {
                self.input_text = value;
                Task::none()
            }
            Message::Submit => match self.session.begin(&self.input_text) {
                Ok(pending) => {
                    debug!(history = pending.request().history.len(), "question accepted");
                    self.input_text.clear();
                    let (run, handle) =
                        Task::future(async move { Message::Settled(pending.run().await) }).abortable();
                    self.request = Some(handle);
                    Task::batch([run, self.scroll_to_end()])
                }
                Err(rejection) => {
                    debug!(?rejection, "submission refused");
                    Task::none()
                }
            },
            Message::Settled(outcome) => {
                debug!(?outcome, "question settled");
                self.request = None;
                Task::batch([self.scroll_to_end(), text_input::focus(self.input_id.clone())])
            }
            Message::ToggleDetails(id) => {
                self.session.toggle_details(id);
                Task::none()
            }
            Message::CopySql(id) => {
                let log = self.session.snapshot();
                match log.get(id).map(|turn| &turn.body) {
                    Some(TurnBody::Answer(Answer { sql: Some(sql), .. })) => clipboard::write(sql.clone()),
                    _ => Task::none(),
                }
            }
            Message::NewDatabase => {
                self.reset_session();
                self.upload_status = None;
                self.screen = Screen::Upload;
                text_input::focus(self.path_id.clone())
            }
            // Only here to repaint the thinking indicator.
            Message::Tick => Task::none(),
            Message::Exit => {
                self.stop_session();
                iced::exit()
            }
        }
    }

    fn subscription(&self) -> Subscription<Message> {
        let timer = if self.session.is_in_flight() {
            time::every(Duration::from_millis(80)).map(|_| Message::Tick)
        } else {
            Subscription::none()
        };

        let events = event::listen_with(|event, _status, _id| {
            if let IcedEvent::Keyboard(keyboard::Event::KeyPressed {
                key: Key::Named(keyboard::key::Named::Escape),
                ..
            }) = event
            {
                Some(Message::Exit)
            } else {
                None
            }
        });

        Subscription::batch([timer, events])
    }

    fn view(&self) -> Element<'_, Message> {
        match self.screen {
            Screen::Upload => self.view_upload(),
            Screen::Chat => self.view_chat(),
        }
    }

    fn view_upload(&self) -> Element<'_, Message> {
        let path = text_input("Path to a .db file...", &self.upload_path)
            .on_input(Message::PathChanged)
            .on_submit(Message::Upload)
            .padding(15)
            .size(18)
            .id(self.path_id.clone());

        let upload = button(text(if self.uploading { "Uploading..." } else { "Upload & Continue" }))
            .on_press_maybe((!self.uploading).then_some(Message::Upload))
            .padding(10);

        let mut content = column![text("Upload Database").size(28), path, upload]
            .spacing(15)
            .padding(20)
            .max_width(640);

        if let Some(status) = &self.upload_status {
            content = content.push(text(status.clone()).size(15));
        }

        container(content)
            .width(Length::Fill)
            .height(Length::Fill)
            .align_x(alignment::Horizontal::Center)
            .align_y(alignment::Vertical::Center)
            .into()
    }

    fn view_chat(&self) -> Element<'_, Message> {
        let log = self.session.snapshot();
        let busy = self.session.is_in_flight();
        let variant = self.config.chat.variant;

        let header = row![
            text("Database Chat Analyzer").size(24).width(Length::Fill),
            button(text("Upload New Database").size(14))
                .on_press(Message::NewDatabase)
                .padding(8),
        ]
        .spacing(10)
        .align_y(alignment::Vertical::Center);

        let entries = if log.is_empty() {
            Column::new().push(text("Ask a question about the uploaded database.").size(15))
        } else {
            log.entries()
                .fold(Column::new().spacing(12), |entries, entry| {
                    entries.push(view_entry(entry, variant))
                })
        };

        let messages = scrollable(container(entries).padding(15).width(Length::Fill))
            .id(self.log_id.clone())
            .height(Length::Fill);

        let mut input = text_input("Ask your question about the data...", &self.input_text)
            .padding(15)
            .size(18)
            .id(self.input_id.clone());
        if !busy {
            input = input
                .on_input(Message::InputChanged)
                .on_submit(Message::Submit);
        }

        let send = button(text(if busy { "Processing..." } else { "Send" }))
            .on_press_maybe((!busy).then_some(Message::Submit))
            .padding(15);

        container(
            column![header, messages, row![input, send].spacing(10)]
                .spacing(10)
                .padding(10),
        )
        .width(Length::Fill)
        .height(Length::Fill)
        .into()
    }

    fn theme(&self) -> Theme {
        Theme::TokyoNight
    }
}

fn bubble<'a>(
    content: impl Into<Element<'a, Message>>,
    side: alignment::Horizontal,
) -> Element<'a, Message> {
    container(container(content).padding(10).style(container::rounded_box))
        .width(Length::Fill)
        .align_x(side)
        .into()
}

fn view_entry(entry: Entry<'_>, variant: Variant) -> Element<'static, Message> {
    match entry {
        Entry::Thinking(thinking) => bubble(
            text(thinking.content.clone()).size(15),
            alignment::Horizontal::Left,
        ),
        Entry::Turn(turn) => match &turn.body {
            TurnBody::User { content } => {
                bubble(text(content.clone()).size(15), alignment::Horizontal::Right)
            }
            TurnBody::Error { content } => {
                bubble(text(content.clone()).size(15), alignment::Horizontal::Left)
            }
            TurnBody::Answer(answer) => view_answer(turn.id, answer, variant),
        },
    }
}

fn view_answer(id: MessageId, answer: &Answer, variant: Variant) -> Element<'static, Message> {
    let mut sections = Column::new().spacing(8);

    if let Some(sql) = &answer.sql {
        sections = sections
            .push(
                row![
                    text("Generated SQL:").size(14).width(Length::Fill),
                    button(text("Copy SQL").size(12))
                        .on_press(Message::CopySql(id))
                        .padding(4),
                ]
                .align_y(alignment::Vertical::Center),
            )
            .push(
                container(text(sql.clone()).size(14))
                    .padding(8)
                    .width(Length::Fill)
                    .style(container::rounded_box),
            );
    }

    if answer.sql.is_some() || answer.result.is_some() {
        let result = match render::render_result(answer.result.as_ref()) {
            ResultView::NoData => text(variant.no_data_text()).size(14),
            ResultView::Table(table) => text(table.to_text()).size(14),
        };
        sections = sections.push(text("Result:").size(14)).push(result);
    }

    if let Some(explanation) = &answer.explanation {
        sections = sections
            .push(text("Explanation:").size(16))
            .push(text(render::markdown_to_text(explanation)).size(14));
    }

    if let Some(disclosure) = render::reasoning_disclosure(answer) {
        sections = sections.push(
            button(text(disclosure.label).size(13))
                .on_press(Message::ToggleDetails(id))
                .padding(6),
        );
        if let Some(body) = disclosure.body {
            sections = sections.push(
                column![text("Thinking Process:").size(14), text(body).size(13)].spacing(4),
            );
        }
    }

    container(sections)
        .padding(12)
        .width(Length::Fill)
        .style(container::rounded_box)
        .into()
}
