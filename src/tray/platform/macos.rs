use std::{
    collections::BTreeMap,
    ffi::c_void,
    fs::OpenOptions,
    os::fd::AsRawFd,
    sync::Once,
};

use anyhow::{Context, Result};
use cocoa::{
    appkit::{
        NSApp, NSApplication, NSApplicationActivationPolicyAccessory,
        NSApplicationActivationPolicyRegular, NSStatusBar,
    },
    base::{id, nil},
    foundation::{NSAutoreleasePool, NSInteger, NSString},
};
use objc::{
    class,
    declare::ClassDecl,
    msg_send,
    runtime::{Class, Object, Sel, BOOL, NO, YES},
    sel, sel_impl,
};
use tracing::{error, info, warn};

use crate::config::ConfigStore;
use crate::status::StatusSlot;
use crate::tray::menu::{IconImage, MenuItem};
use crate::tray::model::{startup_debug, DebugSwitches, ModelUpdate, TrayModel};
use crate::tray::refresh::{RefreshTimer, REFRESH_INTERVAL};
use crate::{logging, platform};

const OUT_LOG: &str = "/tmp/mactools.out";
const ERR_LOG: &str = "/tmp/mactools.err";

pub fn run() -> Result<()> {
    unsafe {
        // Launched from a terminal, closing it would SIGHUP the app. Ignore it and
        // move stdout/stderr off the tty.
        detach_from_terminal();

        let _pool = NSAutoreleasePool::new(nil);

        let store = ConfigStore::from_env().context("resolve config location")?;
        logging::init(startup_debug(
            &store,
            DebugSwitches::from_env(),
            cfg!(debug_assertions),
        ));

        let services = platform::services().context("select platform services")?;
        let model = TrayModel::new(store, services);
        info!(
            debug_window = model.show_debug(),
            debug_alert = model.debug_alert(),
            "launch"
        );

        let app = NSApp();
        let mut state = Box::new(State::new(model));
        let state_ptr: *mut State = &mut *state;

        let target = new_target(state_ptr);
        state
            .install_status_item(target)
            .context("install status item")?;

        let poster = MainThreadPoster(target);
        state.timer = Some(
            RefreshTimer::start(REFRESH_INTERVAL, move || poster.post())
                .context("start refresh timer")?,
        );

        if state.model.debug_alert() {
            show_debug_alert(state.model.config().display_title());
        }

        app.run();
        state.timer.take();
        drop(state);
    }

    Ok(())
}

fn detach_from_terminal() {
    unsafe {
        libc::signal(libc::SIGHUP, libc::SIG_IGN);

        let stdout_is_tty = libc::isatty(libc::STDOUT_FILENO) == 1;
        let stderr_is_tty = libc::isatty(libc::STDERR_FILENO) == 1;
        if !stdout_is_tty && !stderr_is_tty {
            return;
        }

        if let Ok(f) = OpenOptions::new().create(true).append(true).open(OUT_LOG) {
            let _ = libc::dup2(f.as_raw_fd(), libc::STDOUT_FILENO);
        }

        if let Ok(f) = OpenOptions::new().create(true).append(true).open(ERR_LOG) {
            let _ = libc::dup2(f.as_raw_fd(), libc::STDERR_FILENO);
        }
    }
}

struct State {
    model: TrayModel,
    status_item: Option<id>,
    menu: Option<id>,
    status_rows: BTreeMap<StatusSlot, id>,
    timer: Option<RefreshTimer>,
}

impl State {
    fn new(model: TrayModel) -> Self {
        Self {
            model,
            status_item: None,
            menu: None,
            status_rows: BTreeMap::new(),
            timer: None,
        }
    }

    fn install_status_item(&mut self, target: id) -> Result<()> {
        unsafe {
            let status_item: id =
                msg_send![NSStatusBar::systemStatusBar(nil), statusItemWithLength: -1.0];
            self.status_item = Some(status_item);
        }

        self.apply_icon();
        self.rebuild_menu(target);
        self.set_diagnostics(self.model.show_debug());
        Ok(())
    }

    fn apply_icon(&mut self) {
        let Some(status_item) = self.status_item else {
            return;
        };
        let icon = self.model.icon();

        unsafe {
            let button: id = msg_send![status_item, button];
            let image: id = match &icon.image {
                IconImage::File(path) => {
                    let image: id = msg_send![class!(NSImage), alloc];
                    let image: id = msg_send![image, initWithContentsOfFile: nsstring(&path.to_string_lossy())];
                    if image != nil {
                        let _: id = msg_send![image, autorelease];
                    }
                    image
                }
                IconImage::Symbol(name) => symbol_image(name, &icon.tooltip),
            };

            if image == nil {
                warn!("menu bar image unavailable, showing title");
                let _: () = msg_send![button, setImage: nil];
                let _: () = msg_send![button, setTitle: nsstring(&icon.title)];
            } else {
                let _: () = msg_send![image, setTemplate: YES];
                let _: () = msg_send![button, setImage: image];
                let _: () = msg_send![button, setTitle: nsstring("")];
            }
            let _: () = msg_send![button, setToolTip: nsstring(&icon.tooltip)];
        }
    }

    fn rebuild_menu(&mut self, target: id) {
        self.status_rows.clear();

        unsafe {
            let menu: id = msg_send![class!(NSMenu), alloc];
            let menu: id = msg_send![menu, initWithTitle: nsstring(self.model.config().display_title())];
            let _: () = msg_send![menu, setAutoenablesItems: NO];
            let _: () = msg_send![menu, setDelegate: target];

            for item in &self.model.menu().items {
                match item {
                    MenuItem::Header(title) => {
                        add_disabled_item(menu, title);
                    }
                    MenuItem::Separator => {
                        let sep: id = msg_send![class!(NSMenuItem), separatorItem];
                        let _: () = msg_send![menu, addItem: sep];
                    }
                    MenuItem::Status { slot, text } => {
                        let row = add_disabled_item(menu, text);
                        self.status_rows.insert(*slot, row);
                    }
                    MenuItem::Action {
                        id: node,
                        title,
                        enabled,
                        key_equivalent,
                        ..
                    } => add_action_item(
                        menu,
                        title,
                        key_equivalent,
                        target,
                        *node as NSInteger,
                        *enabled,
                    ),
                }
            }

            if let Some(status_item) = self.status_item {
                let _: () = msg_send![status_item, setMenu: menu];
            }

            // The status item holds its own reference now.
            if let Some(old) = self.menu.replace(menu) {
                let _: () = msg_send![old, release];
            }
        }
    }

    fn apply_status(&self, slots: &[StatusSlot]) {
        for slot in slots {
            let Some(row) = self.status_rows.get(slot) else {
                continue;
            };
            let text = self.model.menu().items.iter().find_map(|item| match item {
                MenuItem::Status { slot: s, text } if s == slot => Some(text.as_str()),
                _ => None,
            });
            if let Some(text) = text {
                unsafe {
                    let _: () = msg_send![*row, setTitle: nsstring(text)];
                }
            }
        }
    }

    fn refresh_status(&mut self) {
        let slots = self.model.refresh_status();
        self.apply_status(&slots);
    }

    fn apply(&mut self, update: ModelUpdate, target: id) {
        if update.refresh_icon {
            self.apply_icon();
        }
        if update.refresh_menu {
            self.rebuild_menu(target);
        } else {
            self.apply_status(&update.refreshed_status);
        }
        if let Some(show) = update.show_debug {
            self.set_diagnostics(show);
        }
        if update.quit {
            self.terminate();
        }
    }

    /// Debug mode makes the app a regular, Dock-visible app.
    fn set_diagnostics(&self, show: bool) {
        unsafe {
            let app = NSApp();
            if show {
                app.setActivationPolicy_(NSApplicationActivationPolicyRegular);
                info!(
                    config = %self.model.store().path().display(),
                    "{} is running (menu bar only); debug mode on",
                    self.model.config().display_title()
                );
            } else {
                app.setActivationPolicy_(NSApplicationActivationPolicyAccessory);
            }
        }
    }

    fn terminate(&mut self) {
        self.timer.take();
        unsafe {
            let app = NSApp();
            let _: () = msg_send![app, terminate: nil];
        }
    }
}

impl Drop for State {
    fn drop(&mut self) {
        self.timer.take();
    }
}

/// Hands timer ticks to the main thread, where the menu lives.
struct MainThreadPoster(id);

// Only used to post a selector to the main thread, which AppKit allows from any thread.
unsafe impl Send for MainThreadPoster {}

impl MainThreadPoster {
    fn post(&self) {
        unsafe {
            let _: () = msg_send![self.0, performSelectorOnMainThread: sel!(onRefresh:) withObject: nil waitUntilDone: NO];
        }
    }
}

unsafe fn show_debug_alert(title: &str) {
    let alert: id = msg_send![class!(NSAlert), new];
    let _: () = msg_send![alert, setMessageText: nsstring(&format!("{title} Debug"))];
    let _: () = msg_send![alert, setInformativeText: nsstring(&format!("{title} launched in debug mode. This confirms the app is running."))];
    let _: id = msg_send![alert, addButtonWithTitle: nsstring("OK")];
    let app = NSApp();
    let _: () = msg_send![app, activateIgnoringOtherApps: YES];
    let _: NSInteger = msg_send![alert, runModal];
    let _: () = msg_send![alert, release];
}

unsafe fn symbol_image(name: &str, description: &str) -> id {
    let supported: BOOL = msg_send![
        class!(NSImage),
        respondsToSelector: sel!(imageWithSystemSymbolName:accessibilityDescription:)
    ];
    if supported == NO {
        return nil;
    }
    msg_send![
        class!(NSImage),
        imageWithSystemSymbolName: nsstring(name)
        accessibilityDescription: nsstring(description)
    ]
}

unsafe fn nsstring(s: &str) -> id {
    let s = NSString::alloc(nil).init_str(s);
    msg_send![s, autorelease]
}

unsafe fn add_disabled_item(menu: id, title: &str) -> id {
    let item: id = msg_send![class!(NSMenuItem), alloc];
    let item: id = msg_send![item, initWithTitle: nsstring(title) action: sel!(onMenuItem:) keyEquivalent: nsstring("")];
    let _: () = msg_send![item, setEnabled: NO];
    let _: () = msg_send![menu, addItem: item];
    let _: () = msg_send![item, release];
    item
}

unsafe fn add_action_item(
    menu: id,
    title: &str,
    key_equivalent: &str,
    target: id,
    tag: NSInteger,
    enabled: bool,
) {
    let item: id = msg_send![class!(NSMenuItem), alloc];
    let item: id = msg_send![item, initWithTitle: nsstring(title) action: sel!(onMenuItem:) keyEquivalent: nsstring(key_equivalent)];
    let _: () = msg_send![item, setTarget: target];
    let _: () = msg_send![item, setTag: tag];
    let _: () = msg_send![item, setEnabled: if enabled { YES } else { NO }];
    let _: () = msg_send![menu, addItem: item];
    let _: () = msg_send![item, release];
}

fn target_class() -> *const Class {
    static ONCE: Once = Once::new();
    static mut CLS: *const Class = std::ptr::null();

    ONCE.call_once(|| unsafe {
        let ns_object = class!(NSObject);
        let mut decl = ClassDecl::new("MacToolsMenuTarget", ns_object)
            .expect("MacToolsMenuTarget class already registered");
        decl.add_ivar::<*mut c_void>("state_ptr");
        decl.add_method(
            sel!(onMenuItem:),
            on_menu_item as extern "C" fn(&Object, Sel, id),
        );
        decl.add_method(
            sel!(onRefresh:),
            on_refresh as extern "C" fn(&Object, Sel, id),
        );
        decl.add_method(
            sel!(menuWillOpen:),
            on_refresh as extern "C" fn(&Object, Sel, id),
        );
        CLS = decl.register();
    });

    unsafe { CLS }
}

fn new_target(state_ptr: *mut State) -> id {
    unsafe {
        let cls = target_class();
        let obj: id = msg_send![cls, new];
        (*obj).set_ivar("state_ptr", state_ptr as *mut c_void);
        obj
    }
}

unsafe fn state_of(this: &Object) -> Option<&mut State> {
    let state_ptr: *mut c_void = *this.get_ivar("state_ptr");
    (state_ptr as *mut State).as_mut()
}

extern "C" fn on_menu_item(this: &Object, _cmd: Sel, sender: id) {
    unsafe {
        let Some(state) = state_of(this) else {
            return;
        };
        let tag: NSInteger = msg_send![sender, tag];
        let Ok(node) = u16::try_from(tag) else {
            error!(tag, "menu item tag out of range");
            return;
        };

        let update = state.model.invoke(node);
        state.apply(update, this as *const _ as id);
    }
}

/// Timer tick or the menu about to open: update placeholders in place.
extern "C" fn on_refresh(this: &Object, _cmd: Sel, _arg: id) {
    unsafe {
        if let Some(state) = state_of(this) {
            state.refresh_status();
        }
    }
}
