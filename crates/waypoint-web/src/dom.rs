#![forbid(unsafe_code)]

//! DOM host and `wasm-bindgen` exports.
//!
//! Browser callbacks (keydown, scroll, control clicks, transition ends,
//! animation frames) push [`HostEvent`]s into an inbox and then drain it
//! into the tour. Callbacks fired while the tour is already being driven
//! (e.g. from inside a step callback) leave their event in the inbox for
//! the outer drain. Only compiled on `wasm32` targets.

use core::time::Duration;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::{Rc, Weak};

use js_sys::{Array, Function, Promise, Reflect};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::{
    Document, Element, Event, EventTarget, HtmlElement, KeyboardEvent, ScrollBehavior,
    ScrollIntoViewOptions, ScrollLogicalPosition, Window,
};

use waypoint_backend::{DocumentGeometry, ListenerRegistry, OverlayRenderer, TooltipRequest};
use waypoint_core::{
    AdvancePayload, ArtifactId, BoxSize, ClientRect, DocRect, EventDisposition, HostEvent,
    KeyInput, ListenerKind, ScrollOffset, Side, Step, StepDef, TipAnchor, TourOptions,
};
use waypoint_runtime::{SequencerPhase, Tour};

const CONTAINER_CLASS: &str = "tutorial";
const PULSE_CLASS: &str = "tutorial__pulse";
const TIP_CLASS: &str = "tutorial__tip";
const TIP_VISIBLE_CLASS: &str = "tutorial__tip--visible";
const CONTROL_SELECTOR: &str = ".tutorial__footer > button";

/// The tip is revealed a little after creation so its transition runs.
const TIP_REVEAL_DELAY_MS: i32 = 100;

const NEXT_ICON: &str = "<svg style='width:24px;height:24px' viewBox='0 0 24 24'>\
    <path fill='#fff' d='M8,5.14V19.14L19,12.14L8,5.14Z' /></svg>";
const FINISH_ICON: &str = "<svg style='width:24px;height:24px' viewBox='0 0 24 24'>\
    <path fill='#fff' d='M18,18H6V6H18V18Z' /></svg>";

type Handler = Closure<dyn FnMut(Event)>;
type Inbox = Rc<RefCell<VecDeque<HostEvent>>>;
/// Script values handed to `resolve`, keyed by the index of the step whose
/// `onCreate` receives them.
type Payloads = Rc<RefCell<HashMap<usize, JsValue>>>;

// ============================================================================
// Console / panic plumbing
// ============================================================================

fn console_error(msg: &str) {
    let global = js_sys::global();
    let Ok(console) = Reflect::get(&global, &"console".into()) else {
        return;
    };
    let Ok(error) = Reflect::get(&console, &"error".into()) else {
        return;
    };
    let Ok(error_fn) = error.dyn_into::<Function>() else {
        return;
    };
    let _ = error_fn.call1(&console, &JsValue::from_str(msg));
}

fn install_hooks() {
    use std::sync::Once;

    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        std::panic::set_hook(Box::new(|info| {
            let msg = if let Some(loc) = info.location() {
                format!(
                    "panic at {}:{}:{}: {info}",
                    loc.file(),
                    loc.line(),
                    loc.column()
                )
            } else {
                format!("panic: {info}")
            };
            console_error(&msg);
        }));
        // The page may already have installed a subscriber.
        let _ = tracing_wasm::try_set_as_global_default();
    });
}

// ============================================================================
// Event plumbing
// ============================================================================

/// Where browser callbacks deliver events.
#[derive(Clone)]
struct EventSink {
    inbox: Inbox,
    runner: Weak<RefCell<Runner>>,
}

impl EventSink {
    /// Queue `event` and drain the inbox if the tour is free.
    fn push(&self, event: HostEvent) -> EventDisposition {
        self.inbox.borrow_mut().push_back(event);
        self.with_runner(Runner::drain)
            .unwrap_or(EventDisposition::Pass)
    }

    /// Let the tour observe a signal fired from script.
    fn wake(&self) {
        self.with_runner(Runner::pump);
    }

    fn with_runner<R>(&self, f: impl FnOnce(&mut Runner) -> R) -> Option<R> {
        let runner = self.runner.upgrade()?;
        let mut guard = runner.try_borrow_mut().ok()?;
        Some(f(&mut guard))
    }
}

struct Runner {
    tour: Tour<DomHost>,
    inbox: Inbox,
    frame: Closure<dyn FnMut(f64)>,
    frame_pending: bool,
}

impl Runner {
    fn next_event(&self) -> Option<HostEvent> {
        self.inbox.borrow_mut().pop_front()
    }

    fn drain(&mut self) -> EventDisposition {
        let mut disposition = EventDisposition::Pass;
        while let Some(event) = self.next_event() {
            match self.tour.handle(event) {
                Ok(EventDisposition::Consumed) => disposition = EventDisposition::Consumed,
                Ok(EventDisposition::Pass) => {}
                Err(err) => tracing::debug!(message = "tutorial.dispatch.failed", error = %err),
            }
        }
        self.schedule_frame();
        disposition
    }

    fn pump(&mut self) {
        if let Err(err) = self.tour.pump() {
            tracing::debug!(message = "tutorial.pump.failed", error = %err);
        }
        self.drain();
    }

    fn schedule_frame(&mut self) {
        if self.frame_pending || !wants_frames(self.tour.phase()) {
            return;
        }
        let Some(window) = web_sys::window() else {
            return;
        };
        if window
            .request_animation_frame(self.frame.as_ref().unchecked_ref())
            .is_ok()
        {
            self.frame_pending = true;
        }
    }
}

/// Frames only matter while a step waits for its scroll to settle.
fn wants_frames(phase: SequencerPhase) -> bool {
    matches!(phase, SequencerPhase::Settling(_))
}

fn frame_time(timestamp_ms: f64) -> Duration {
    Duration::try_from_secs_f64(timestamp_ms / 1000.0).unwrap_or_default()
}

// ============================================================================
// DOM host
// ============================================================================

struct DomArtifact {
    element: HtmlElement,
    _handlers: Vec<Handler>,
}

struct DomHost {
    window: Window,
    document: Document,
    sink: EventSink,
    container: Option<HtmlElement>,
    artifacts: HashMap<ArtifactId, DomArtifact>,
    listeners: Vec<(ListenerKind, Handler)>,
}

fn px(value: f64) -> String {
    format!("{value}px")
}

fn set_style(element: &HtmlElement, pairs: &[(&str, f64)]) {
    let style = element.style();
    for (name, value) in pairs {
        let _ = style.set_property(name, &px(*value));
    }
}

fn side_class(side: Side) -> String {
    format!("{TIP_CLASS}--{side}")
}

fn tooltip_markup(request: &TooltipRequest<'_>) -> String {
    let icon = if request.is_last() {
        FINISH_ICON
    } else {
        NEXT_ICON
    };
    format!(
        "<div>{content}<div class='tutorial__footer'><span>{counter}</span>\
         <button>{icon}</button></div></div>",
        content = request.content,
        counter = request.counter_label(),
    )
}

impl DomHost {
    fn new(window: Window, document: Document, sink: EventSink) -> Self {
        Self {
            window,
            document,
            sink,
            container: None,
            artifacts: HashMap::new(),
            listeners: Vec::new(),
        }
    }

    fn create_div(&self, class: &str) -> Option<HtmlElement> {
        let element = self.document.create_element("div").ok()?;
        element.set_class_name(class);
        element.dyn_into::<HtmlElement>().ok()
    }

    fn insert(&mut self, id: ArtifactId, element: HtmlElement, handlers: Vec<Handler>) {
        let Some(container) = &self.container else {
            tracing::warn!(message = "tutorial.artifact.orphaned", %id);
            return;
        };
        if container.append_child(&element).is_err() {
            tracing::warn!(message = "tutorial.artifact.append_failed", %id);
            return;
        }
        self.artifacts.insert(
            id,
            DomArtifact {
                element,
                _handlers: handlers,
            },
        );
    }

    fn listen(&self, target: &EventTarget, name: &str, handler: &Handler) -> bool {
        target
            .add_event_listener_with_callback(name, handler.as_ref().unchecked_ref())
            .is_ok()
    }

    fn listener_target(&self, kind: ListenerKind) -> (&EventTarget, &'static str) {
        let document: &EventTarget = &self.document;
        let window: &EventTarget = &self.window;
        match kind {
            ListenerKind::KeyDown => (document, "keydown"),
            ListenerKind::HighlightReflow | ListenerKind::TipReflow => (window, "scroll"),
        }
    }
}

impl DocumentGeometry for DomHost {
    type Element = Element;

    fn query_selector(&self, selector: &str) -> Option<Element> {
        self.document.query_selector(selector).ok().flatten()
    }

    fn client_rect(&self, element: &Element) -> ClientRect {
        let rect = element.get_bounding_client_rect();
        ClientRect::new(rect.top(), rect.left(), rect.width(), rect.height())
    }

    fn border_box(&self, element: &Element) -> BoxSize {
        match element.dyn_ref::<HtmlElement>() {
            Some(html) => BoxSize::new(
                f64::from(html.offset_width()),
                f64::from(html.offset_height()),
            ),
            None => {
                let rect = element.get_bounding_client_rect();
                BoxSize::new(rect.width(), rect.height())
            }
        }
    }

    fn scroll_offset(&self) -> ScrollOffset {
        ScrollOffset::new(
            self.window.scroll_x().unwrap_or_default(),
            self.window.scroll_y().unwrap_or_default(),
        )
    }

    fn scroll_into_view_centered(&mut self, element: &Element) {
        element.scroll_into_view_with_scroll_into_view_options(&centering_scroll());
    }
}

/// Center vertically; move horizontally only as far as needed.
fn centering_scroll() -> ScrollIntoViewOptions {
    let options = ScrollIntoViewOptions::new();
    options.set_behavior(ScrollBehavior::Smooth);
    options.set_block(ScrollLogicalPosition::Center);
    options.set_inline(ScrollLogicalPosition::Nearest);
    options
}

impl OverlayRenderer for DomHost {
    fn create_container(&mut self) {
        let Some(container) = self.create_div(CONTAINER_CLASS) else {
            return;
        };
        let Some(body) = self.document.body() else {
            tracing::warn!(message = "tutorial.container.no_body");
            return;
        };
        if body.append_child(&container).is_ok() {
            self.container = Some(container);
        }
    }

    fn remove_container(&mut self) {
        if let Some(container) = self.container.take() {
            container.remove();
        }
        self.artifacts.clear();
    }

    fn create_highlight(&mut self, id: ArtifactId, rect: DocRect, _target: &Element) {
        let Some(pulse) = self.create_div(PULSE_CLASS) else {
            return;
        };
        pulse.set_inner_html("<div></div><div></div><div></div><div></div>");
        self.insert(id, pulse, Vec::new());
        self.move_highlight(id, rect);
    }

    fn create_tooltip(&mut self, id: ArtifactId, request: &TooltipRequest<'_>) {
        let Some(tip) = self.create_div(TIP_CLASS) else {
            return;
        };
        tip.set_inner_html(&tooltip_markup(request));
        if let Some(side) = request.side {
            let _ = tip.class_list().add_1(&side_class(side));
        }

        let mut handlers = Vec::new();
        if let Ok(Some(control)) = tip.query_selector(CONTROL_SELECTOR) {
            let sink = self.sink.clone();
            let click = Handler::new(move |_event: Event| {
                sink.push(HostEvent::AdvanceActivated { tip: id });
            });
            if self.listen(&control, "click", &click) {
                handlers.push(click);
            }
        }

        let sink = self.sink.clone();
        let ended = Handler::new(move |event: Event| {
            // Transitions of the tip's children bubble up; only the tip's own count.
            if event.target() == event.current_target() {
                sink.push(HostEvent::TransitionEnd { artifact: id });
            }
        });
        if self.listen(&tip, "transitionend", &ended) {
            handlers.push(ended);
        }

        self.insert(id, tip, handlers);
    }

    fn measure(&self, id: ArtifactId) -> BoxSize {
        self.artifacts.get(&id).map_or_else(BoxSize::default, |artifact| {
            let rect = artifact.element.get_bounding_client_rect();
            BoxSize::new(rect.width(), rect.height())
        })
    }

    fn move_highlight(&mut self, id: ArtifactId, rect: DocRect) {
        if let Some(artifact) = self.artifacts.get(&id) {
            set_style(
                &artifact.element,
                &[
                    ("top", rect.top),
                    ("left", rect.left),
                    ("width", rect.width),
                    ("height", rect.height),
                ],
            );
        }
    }

    fn move_tooltip(&mut self, id: ArtifactId, side: Side, anchor: TipAnchor) {
        let Some(artifact) = self.artifacts.get(&id) else {
            return;
        };
        set_style(&artifact.element, &[("top", anchor.top), ("left", anchor.left)]);
        let classes = artifact.element.class_list();
        for other in Side::ALL.into_iter().filter(|s| *s != side) {
            let _ = classes.remove_1(&side_class(other));
        }
        let _ = classes.add_1(&side_class(side));
    }

    fn set_visible(&mut self, id: ArtifactId, visible: bool) {
        let Some(artifact) = self.artifacts.get(&id) else {
            return;
        };
        if !visible {
            let _ = artifact.element.class_list().remove_1(TIP_VISIBLE_CLASS);
            return;
        }
        let element = artifact.element.clone();
        let reveal = Closure::once_into_js(move || {
            let _ = element.class_list().add_1(TIP_VISIBLE_CLASS);
        });
        if self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                reveal.unchecked_ref(),
                TIP_REVEAL_DELAY_MS,
            )
            .is_err()
        {
            let _ = artifact.element.class_list().add_1(TIP_VISIBLE_CLASS);
        }
    }

    fn destroy(&mut self, id: ArtifactId) {
        if let Some(artifact) = self.artifacts.remove(&id) {
            artifact.element.remove();
        }
    }
}

impl ListenerRegistry for DomHost {
    fn attach(&mut self, listener: ListenerKind) {
        let sink = self.sink.clone();
        let handler = match listener {
            ListenerKind::KeyDown => Handler::new(move |event: Event| {
                let Some(key) = event.dyn_ref::<KeyboardEvent>() else {
                    return;
                };
                let input = KeyInput::new(key.key_code(), key.key());
                if sink.push(HostEvent::KeyDown(input)).prevents_default() {
                    event.prevent_default();
                }
            }),
            reflow => Handler::new(move |_event: Event| {
                sink.push(HostEvent::Scroll { listener: reflow });
            }),
        };
        let (target, name) = self.listener_target(listener);
        if self.listen(target, name, &handler) {
            self.listeners.push((listener, handler));
        }
    }

    fn detach(&mut self, listener: ListenerKind) {
        let Some(index) = self.listeners.iter().position(|(kind, _)| *kind == listener) else {
            return;
        };
        let (_, handler) = self.listeners.remove(index);
        let (target, name) = self.listener_target(listener);
        let _ = target.remove_event_listener_with_callback(name, handler.as_ref().unchecked_ref());
    }
}

// ============================================================================
// Script conversions
// ============================================================================

fn string_prop(object: &JsValue, key: &str) -> Option<String> {
    Reflect::get(object, &JsValue::from_str(key))
        .ok()
        .and_then(|value| value.as_string())
}

fn function_prop(object: &JsValue, key: &str) -> Option<Function> {
    Reflect::get(object, &JsValue::from_str(key))
        .ok()
        .and_then(|value| value.dyn_into::<Function>().ok())
}

fn index_to_js(index: usize) -> JsValue {
    u32::try_from(index).map_or(JsValue::UNDEFINED, JsValue::from)
}

fn report_callback_error(name: &str, err: &JsValue) {
    tracing::error!(message = "tutorial.callback.threw", callback = name, error = ?err);
}

/// Read options from script. Problems are logged and fall back to the
/// defaults; construction never throws over options.
fn options_from_js(value: &JsValue) -> TourOptions {
    if value.is_undefined() || value.is_null() {
        return TourOptions::default();
    }
    let json = match js_sys::JSON::stringify(value) {
        Ok(json) => json.as_string().unwrap_or_else(|| "{}".to_owned()),
        Err(err) => {
            tracing::error!(message = "tutorial.options.unreadable", error = ?err);
            return TourOptions::default();
        }
    };
    match TourOptions::from_json_str(&json).and_then(TourOptions::validated) {
        Ok(options) => options,
        Err(err) => {
            tracing::error!(message = "tutorial.options.rejected", error = %err);
            TourOptions::default()
        }
    }
}

/// Build steps from a script array. Anything else yields no steps.
fn steps_from_js(value: &JsValue, default_side: Side, sink: &EventSink) -> Vec<Step> {
    let Some(items) = value.dyn_ref::<Array>() else {
        return Vec::new();
    };
    let payloads = Payloads::default();
    items
        .iter()
        .map(|item| step_from_js(items, &item, default_side, sink, &payloads))
        .collect()
}

fn step_from_js(
    items: &Array,
    item: &JsValue,
    default_side: Side,
    sink: &EventSink,
    payloads: &Payloads,
) -> Step {
    let def = StepDef {
        target: string_prop(item, "target").unwrap_or_default(),
        content: string_prop(item, "html")
            .or_else(|| string_prop(item, "content"))
            .unwrap_or_default(),
        position: string_prop(item, "position"),
    };
    let mut step = Step::from_def(def, default_side);

    if let Some(on_create) = function_prop(item, "onCreate") {
        let item = item.clone();
        let payloads = Rc::clone(payloads);
        step = step.on_create(move |index, _step, previous| {
            let previous = previous
                .and_then(|_| payloads.borrow_mut().remove(&index))
                .unwrap_or(JsValue::UNDEFINED);
            if let Err(err) =
                on_create.call3(&JsValue::UNDEFINED, &index_to_js(index), &item, &previous)
            {
                report_callback_error("onCreate", &err);
            }
        });
    }

    if let Some(on_next) = function_prop(item, "onNext") {
        let items = items.clone();
        let sink = sink.clone();
        let payloads = Rc::clone(payloads);
        step = step.on_next(move |next_index, _next, signal| {
            let next = u32::try_from(next_index).map_or(JsValue::UNDEFINED, |i| items.get(i));
            let sink = sink.clone();
            let payloads = Rc::clone(&payloads);
            let resolve = Closure::<dyn FnMut(JsValue)>::new(move |value: JsValue| {
                if value.is_undefined() {
                    if signal.advance() {
                        sink.wake();
                    }
                    return;
                }
                // The tour carries the step index; the script value stays here.
                if signal.fire(Some(AdvancePayload::from(next_index))) {
                    payloads.borrow_mut().insert(next_index, value);
                    sink.wake();
                }
            })
            .into_js_value();
            if let Err(err) =
                on_next.call3(&JsValue::UNDEFINED, &index_to_js(next_index), &next, &resolve)
            {
                report_callback_error("onNext", &err);
            }
        });
    }
    step
}

// ============================================================================
// Exports
// ============================================================================

/// A guided tour over the current page.
///
/// ```js
/// const tour = new Tutorial([{ target: "#a", html: "Hello" }], {});
/// const end = await tour.start(); // "finished" | "cancelled" | "inert"
/// ```
#[wasm_bindgen]
pub struct Tutorial {
    runner: Rc<RefCell<Runner>>,
}

#[wasm_bindgen]
impl Tutorial {
    /// Create a tour from an array of step objects and an options object.
    ///
    /// An empty or non-array `steps` logs an error; `start()` then resolves
    /// immediately with `"inert"`. Unusable options are logged and replaced
    /// by the defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(steps: JsValue, options: JsValue) -> Result<Tutorial, JsValue> {
        install_hooks();
        let options = options_from_js(&options);
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("no document"))?;

        let inbox: Inbox = Rc::default();
        let runner = Rc::new_cyclic(|weak: &Weak<RefCell<Runner>>| {
            let sink = EventSink {
                inbox: Rc::clone(&inbox),
                runner: weak.clone(),
            };
            let steps = steps_from_js(&steps, options.default_position, &sink);
            let host = DomHost::new(window, document, sink.clone());
            let frame_sink = sink;
            let frame = Closure::<dyn FnMut(f64)>::new(move |timestamp: f64| {
                frame_sink.with_runner(|runner| runner.frame_pending = false);
                frame_sink.push(HostEvent::Frame {
                    now: frame_time(timestamp),
                });
            });
            RefCell::new(Runner {
                tour: Tour::new(host, steps, options),
                inbox,
                frame,
                frame_pending: false,
            })
        });
        Ok(Tutorial { runner })
    }

    /// Start the tour. The promise resolves with how it ended, or rejects
    /// when a step's target is missing.
    pub fn start(&self) -> Promise {
        let completion = match self.runner.try_borrow_mut() {
            Ok(mut runner) => {
                let completion = runner.tour.start();
                runner.drain();
                completion
            }
            Err(_) => {
                return Promise::reject(&js_sys::Error::new("tutorial is busy").into());
            }
        };
        future_to_promise(async move {
            match completion.await {
                Ok(end) => Ok(JsValue::from_str(end.as_str())),
                Err(err) => Err(js_sys::Error::new(&err.to_string()).into()),
            }
        })
    }

    /// Cancel a running tour, as Escape would.
    pub fn cancel(&self) {
        match self.runner.try_borrow_mut() {
            Ok(mut runner) => runner.tour.cancel(),
            Err(_) => tracing::warn!(message = "tutorial.cancel.busy"),
        }
    }

    /// Whether the tour has started and not yet ended.
    #[wasm_bindgen(js_name = isRunning)]
    pub fn is_running(&self) -> bool {
        self.runner
            .try_borrow()
            .map(|runner| runner.tour.is_running())
            .unwrap_or(true)
    }

    /// Index of the active step, if any.
    #[wasm_bindgen(js_name = currentIndex)]
    pub fn current_index(&self) -> Option<u32> {
        let runner = self.runner.try_borrow().ok()?;
        runner
            .tour
            .current_index()
            .and_then(|index| u32::try_from(index).ok())
    }
}
