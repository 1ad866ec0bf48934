use crate::vr::{ArError, ArResult, ArSession, ArSessionProvider, HitTestSource, SessionOptions};
use openxr::{
    ApplicationInfo, EnvironmentBlendMode, Entry, ExtensionSet, FormFactor, Instance,
    ViewConfigurationType,
};

/// Session provider backed by the system OpenXR runtime. A device counts as
/// AR-capable when its primary stereo view blends with the real world.
pub struct OpenXrSessionProvider {
    runtime: Option<OpenXrRuntime>,
}

struct OpenXrRuntime {
    instance: Instance,
    system_id: openxr::SystemId,
    passthrough: bool,
}

impl OpenXrSessionProvider {
    pub fn initialize() -> Self {
        match connect() {
            Ok(runtime) => {
                log::info!(
                    "[openxr] runtime connected (passthrough blend: {})",
                    runtime.passthrough
                );
                Self {
                    runtime: Some(runtime),
                }
            }
            Err(err) => {
                log::warn!("[openxr] runtime unavailable: {err}");
                Self { runtime: None }
            }
        }
    }

    pub fn instance(&self) -> Option<&Instance> {
        self.runtime.as_ref().map(|runtime| &runtime.instance)
    }
}

fn connect() -> ArResult<OpenXrRuntime> {
    // SAFETY: loads the system OpenXR loader library; no other invariants required.
    let entry = unsafe { Entry::load() }
        .map_err(|err| ArError::SessionStart(format!("failed to load OpenXR loader: {err}")))?;
    let app_info = ApplicationInfo {
        application_name: "Furniture XR",
        application_version: 1,
        engine_name: "Furniture XR",
        engine_version: 1,
    };

    let instance = entry
        .create_instance(&app_info, &ExtensionSet::default(), &[])
        .map_err(|err| ArError::SessionStart(format!("failed to create OpenXR instance: {err}")))?;

    let system_id = instance
        .system(FormFactor::HEAD_MOUNTED_DISPLAY)
        .map_err(|err| ArError::SessionStart(format!("failed to query OpenXR system: {err}")))?;

    let blend_modes = instance
        .enumerate_environment_blend_modes(system_id, ViewConfigurationType::PRIMARY_STEREO)
        .map_err(|err| {
            ArError::SessionStart(format!("failed to query environment blend modes: {err}"))
        })?;
    let passthrough = blend_modes.iter().any(|mode| {
        *mode == EnvironmentBlendMode::ALPHA_BLEND || *mode == EnvironmentBlendMode::ADDITIVE
    });

    Ok(OpenXrRuntime {
        instance,
        system_id,
        passthrough,
    })
}

impl ArSessionProvider for OpenXrSessionProvider {
    fn label(&self) -> &'static str {
        "OpenXR"
    }

    fn is_supported(&self) -> bool {
        self.runtime
            .as_ref()
            .map(|runtime| runtime.passthrough)
            .unwrap_or(false)
    }

    fn start(&mut self, options: &SessionOptions) -> ArResult<Box<dyn ArSession>> {
        let runtime = self.runtime.as_ref().ok_or(ArError::Unsupported)?;
        if !runtime.passthrough {
            return Err(ArError::Unsupported);
        }
        log::info!(
            "[openxr] starting {} session on system {:?}",
            options.mode,
            runtime.system_id
        );
        Ok(Box::new(OpenXrSession {
            instance: runtime.instance.clone(),
            ended: false,
        }))
    }
}

struct OpenXrSession {
    instance: Instance,
    ended: bool,
}

impl ArSession for OpenXrSession {
    fn label(&self) -> &'static str {
        "OpenXR session"
    }

    fn request_hit_test_source(&mut self) -> ArResult<Box<dyn HitTestSource>> {
        // Core OpenXR exposes no ray/plane intersection; surface tracking stays
        // empty until a plane-detection extension is wired in.
        Err(ArError::HitTestUnavailable(format!(
            "runtime {} exposes no hit-test extension",
            self.instance
                .properties()
                .map(|props| props.runtime_name)
                .unwrap_or_else(|_| "unknown".to_string())
        )))
    }

    fn end(&mut self) {
        if !self.ended {
            self.ended = true;
            log::info!("[openxr] session end requested");
        }
    }
}
