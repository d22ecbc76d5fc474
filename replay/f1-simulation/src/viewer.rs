// iced front end: plays the replay frame by frame on a canvas.

use std::time::{Duration, Instant};

use f1_replay_logic::chart::{header_labels, AxisRange};
use f1_replay_logic::frame::{Channel, DrawInstruction, Segment};
use f1_replay_logic::model::{format_lap_time, Point as DataPoint, RgbColor};
use f1_replay_logic::{DriverRecord, ReplayState, Result};
use iced::alignment;
use iced::executor;
use iced::theme::{self, Theme};
use iced::time;
use iced::widget::canvas::{self, Canvas, Frame, Path, Program, Stroke};
use iced::widget::{button, column, container, row, text};
use iced::window;
use iced::{mouse, Alignment, Application, Color, Command, Element, Length, Point, Rectangle, Renderer, Size, Subscription};
use log::{debug, error, info};

const PANEL_GAP: f32 = 12.0;
const TITLE_SIZE: f32 = 14.0;

pub struct ViewerFlags {
    title: String,
    replay: ReplayState,
    first: DrawInstruction,
}

impl ViewerFlags {
    pub fn new(title: String, replay: ReplayState) -> Result<Self> {
        let first = replay.frame(0)?;
        Ok(Self { title, replay, first })
    }
}

pub struct ReplayViewer {
    title: String,
    replay: ReplayState,
    labels: Vec<(String, RgbColor)>,
    instruction: DrawInstruction,
    playback: Playback,
    played: Duration,
    loops: usize,
}

enum Playback {
    Paused,
    Playing { last_tick: Instant },
}

#[derive(Debug, Clone)]
pub enum ViewerMessage {
    TogglePlayback,
    Restart,
    Tick(Instant),
}

impl ReplayViewer {
    /// Moves to `frame`. A frame the replay cannot produce ends the run.
    fn show(&mut self, frame: usize) -> Command<ViewerMessage> {
        match self.replay.frame(frame) {
            Ok(instruction) => {
                self.instruction = instruction;
                Command::none()
            }
            Err(err) => {
                error!("replay stopped: {}", err);
                window::close(window::Id::MAIN)
            }
        }
    }
}

impl Application for ReplayViewer {
    type Message = ViewerMessage;
    type Theme = Theme;
    type Executor = executor::Default;
    type Flags = ViewerFlags;

    fn new(flags: ViewerFlags) -> (ReplayViewer, Command<ViewerMessage>) {
        let ViewerFlags {
            title,
            replay,
            first: instruction,
        } = flags;

        // Labels come back in finishing order.
        let mut by_position: Vec<&DriverRecord> = replay.drivers().iter().collect();
        by_position.sort_by_key(|driver| driver.position);
        let labels = header_labels(replay.drivers())
            .into_iter()
            .zip(by_position.iter().map(|driver| driver.color))
            .collect();

        (
            ReplayViewer {
                title,
                replay,
                labels,
                instruction,
                playback: Playback::Playing {
                    last_tick: Instant::now(),
                },
                played: Duration::default(),
                loops: 0,
            },
            Command::none(),
        )
    }

    fn title(&self) -> String {
        self.title.clone()
    }

    fn update(&mut self, message: ViewerMessage) -> Command<ViewerMessage> {
        match message {
            ViewerMessage::TogglePlayback => {
                self.playback = match self.playback {
                    Playback::Paused => Playback::Playing {
                        last_tick: Instant::now(),
                    },
                    Playback::Playing { .. } => Playback::Paused,
                };
            }
            ViewerMessage::Restart => {
                info!("Restarting replay");
                return self.show(0);
            }
            ViewerMessage::Tick(now) => {
                if let Playback::Playing { last_tick } = &mut self.playback {
                    self.played += now - *last_tick;
                    *last_tick = now;

                    let mut next = self.instruction.frame + 1;
                    if next >= self.replay.frame_count() {
                        self.loops += 1;
                        debug!("replay finished, starting loop {}", self.loops + 1);
                        next = 0;
                    }
                    return self.show(next);
                }
            }
        }

        Command::none()
    }

    fn subscription(&self) -> Subscription<ViewerMessage> {
        match self.playback {
            Playback::Paused => Subscription::none(),
            Playback::Playing { .. } => {
                let interval = Duration::from_millis(self.replay.variant().frame_interval_ms());
                time::every(interval).map(ViewerMessage::Tick)
            }
        }
    }

    fn view(&self) -> Element<ViewerMessage> {
        let header = self.labels.iter().fold(row![].spacing(30), |header, (label, color)| {
            header.push(text(label).size(18).style(to_color(*color)))
        });

        let clock = match self.instruction.lap_clock {
            Some(clock) => format!("  lap clock {}", format_lap_time(Some(clock))),
            None => String::new(),
        };
        let status = text(format!(
            "{:>5.1}s  Frame {}/{}{}  dominant: {}",
            self.played.as_secs_f64(),
            self.instruction.frame + 1,
            self.replay.frame_count(),
            clock,
            self.instruction.leader.label()
        ))
        .size(20);

        let button = |label| {
            button(text(label).horizontal_alignment(alignment::Horizontal::Center))
                .padding(10)
                .width(90)
        };

        let toggle_button = {
            let label = match self.playback {
                Playback::Paused => "Play",
                Playback::Playing { .. } => "Pause",
            };
            button(label).on_press(ViewerMessage::TogglePlayback)
        };

        let restart_button = button("Restart")
            .style(theme::Button::Destructive)
            .on_press(ViewerMessage::Restart);

        let controls = row![
            container(status).padding(10),
            container(toggle_button).padding(10),
            container(restart_button).padding(10)
        ]
        .align_items(Alignment::Center)
        .spacing(20);

        let canvas = Canvas::new(ReplayCanvas {
            replay: &self.replay,
            instruction: &self.instruction,
        })
        .width(Length::Fill)
        .height(Length::Fill);

        container(column![header, canvas, controls].spacing(10))
            .width(Length::Fill)
            .height(Length::Fill)
            .align_x(alignment::Horizontal::Center)
            .align_y(alignment::Vertical::Center)
            .padding(20)
            .into()
    }

    fn theme(&self) -> Theme {
        Theme::Light
    }
}

fn to_color(color: RgbColor) -> Color {
    Color::from_rgb8(color.r, color.g, color.b)
}

/// Maps data coordinates into a screen rectangle, y growing upwards.
struct Viewport {
    bounds: Rectangle,
    x: AxisRange,
    y: AxisRange,
}

impl Viewport {
    /// Keeps one data unit the same size on both axes, centred in `bounds`.
    fn uniform(bounds: Rectangle, x: AxisRange, y: AxisRange) -> Self {
        let scale = (bounds.width as f64 / x.span().max(f64::EPSILON)).min(bounds.height as f64 / y.span().max(f64::EPSILON));
        let width = (x.span() * scale) as f32;
        let height = (y.span() * scale) as f32;
        Self {
            bounds: Rectangle::new(
                Point::new(
                    bounds.x + (bounds.width - width) / 2.0,
                    bounds.y + (bounds.height - height) / 2.0,
                ),
                Size::new(width, height),
            ),
            x,
            y,
        }
    }

    fn project(&self, point: DataPoint) -> Point {
        let fx = self.x.fraction(point.x) as f32;
        let fy = self.y.fraction(point.y) as f32;
        Point::new(
            self.bounds.x + fx * self.bounds.width,
            self.bounds.y + (1.0 - fy) * self.bounds.height,
        )
    }

    /// Pixels per data unit along x.
    fn scale(&self) -> f32 {
        self.bounds.width / self.x.span().max(f64::EPSILON) as f32
    }
}

enum Drawable<'a> {
    Segments(&'a [Segment], f32),
    Car(DataPoint, RgbColor),
}

struct ReplayCanvas<'a> {
    replay: &'a ReplayState,
    instruction: &'a DrawInstruction,
}

impl<'a> ReplayCanvas<'a> {
    fn draw_track(&self, frame: &mut Frame, bounds: Rectangle) {
        let extents = self.replay.extents();
        draw_title(frame, bounds, "Sector Dominance");
        let area = Rectangle::new(
            Point::new(bounds.x, bounds.y + TITLE_SIZE + 4.0),
            Size::new(bounds.width, bounds.height - TITLE_SIZE - 4.0),
        );
        let view = Viewport::uniform(area, extents.track_x, extents.track_y);

        let track = self.replay.track();
        if track.len() > 1 {
            let outline = Path::new(|builder| {
                builder.move_to(view.project(track.point(0)));
                for i in 1..track.len() {
                    builder.line_to(view.project(track.point(i)));
                }
            });
            frame.stroke(
                &outline,
                Stroke::default().with_color(Color::from_rgb8(210, 210, 210)).with_width(6.0),
            );
        }

        let mut layers: Vec<(u32, Drawable)> = Vec::new();
        layers.push((self.instruction.track_z_order, Drawable::Segments(&self.instruction.track, 4.0)));
        for car in &self.instruction.cars {
            layers.push((car.z_order, Drawable::Car(car.center, car.color)));
        }
        layers.sort_by_key(|(z, _)| *z);

        let radius = (extents.car_radius as f32 * view.scale()).max(4.0);
        for (_, drawable) in layers {
            match drawable {
                Drawable::Segments(segments, width) => stroke_segments(frame, &view, segments, width),
                Drawable::Car(center, color) => {
                    let circle = Path::circle(view.project(center), radius);
                    frame.fill(&circle, to_color(color));
                    frame.stroke(&circle, Stroke::default().with_color(Color::BLACK).with_width(1.0));
                }
            }
        }
    }

    fn draw_channel(&self, frame: &mut Frame, bounds: Rectangle, channel: Channel) {
        let extents = self.replay.extents();
        let axis = match channel {
            Channel::Speed => extents.speed,
            Channel::Throttle => extents.throttle,
            Channel::Brake => extents.brake,
            Channel::Delta => extents.delta,
        };
        draw_title(frame, bounds, channel.title());
        let area = Rectangle::new(
            Point::new(bounds.x, bounds.y + TITLE_SIZE + 4.0),
            Size::new(bounds.width, bounds.height - TITLE_SIZE - 4.0),
        );
        frame.stroke(
            &Path::rectangle(area.position(), area.size()),
            Stroke::default().with_color(Color::from_rgb8(180, 180, 180)).with_width(1.0),
        );
        let view = Viewport {
            bounds: area,
            x: extents.distance,
            y: axis,
        };

        if channel == Channel::Delta {
            let zero = Path::line(
                view.project(DataPoint::new(extents.distance.min, 0.0)),
                view.project(DataPoint::new(extents.distance.max, 0.0)),
            );
            frame.stroke(&zero, Stroke::default().with_color(Color::from_rgb8(120, 120, 120)).with_width(1.0));
        }

        let mut traces: Vec<_> = self
            .instruction
            .traces
            .iter()
            .filter_map(|traces| Some((traces.z_order, traces.channel(channel)?)))
            .collect();
        traces.sort_by_key(|(z, _)| *z);
        for (_, trace) in traces {
            stroke_segments(frame, &view, &trace.segments, 2.0);
        }
    }
}

impl<'a, Message> Program<Message> for ReplayCanvas<'a> {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<canvas::Geometry> {
        let mut frame = Frame::new(renderer, bounds.size());

        let half = (bounds.width - PANEL_GAP) / 2.0;
        self.draw_track(
            &mut frame,
            Rectangle::new(Point::ORIGIN, Size::new(half, bounds.height)),
        );

        let mut channels = vec![Channel::Speed, Channel::Throttle, Channel::Brake];
        if self.replay.variant().with_delta() {
            channels.push(Channel::Delta);
        }
        let panel_height = (bounds.height - PANEL_GAP * (channels.len() - 1) as f32) / channels.len() as f32;
        for (i, channel) in channels.into_iter().enumerate() {
            let top = i as f32 * (panel_height + PANEL_GAP);
            self.draw_channel(
                &mut frame,
                Rectangle::new(Point::new(half + PANEL_GAP, top), Size::new(half, panel_height)),
                channel,
            );
        }

        vec![frame.into_geometry()]
    }
}

fn draw_title(frame: &mut Frame, bounds: Rectangle, title: &str) {
    frame.fill_text(canvas::Text {
        content: title.to_string(),
        position: Point::new(bounds.x, bounds.y),
        color: Color::BLACK,
        size: TITLE_SIZE.into(),
        ..canvas::Text::default()
    });
}

fn stroke_segments(frame: &mut Frame, view: &Viewport, segments: &[Segment], width: f32) {
    for segment in segments {
        let line = Path::line(view.project(segment.from), view.project(segment.to));
        frame.stroke(&line, Stroke::default().with_color(to_color(segment.color)).with_width(width));
    }
}
