use luaconfig_core::ProcessManagerFactory;

/// Platform-independent factory that selects the appropriate implementation at compile time
pub struct PlatformProcessManagerFactory;

impl ProcessManagerFactory for PlatformProcessManagerFactory {
    #[cfg(unix)]
    type Manager = luaconfig_unix::UnixProcessManager;

    #[cfg(windows)]
    type Manager = luaconfig_windows::WindowsProcessManager;

    fn create_process_manager() -> Self::Manager {
        #[cfg(unix)]
        return luaconfig_unix::UnixProcessManagerFactory::create_process_manager();

        #[cfg(windows)]
        return luaconfig_windows::WindowsProcessManagerFactory::create_process_manager();
    }

    fn platform_name() -> &'static str {
        #[cfg(unix)]
        return luaconfig_unix::UnixProcessManagerFactory::platform_name();

        #[cfg(windows)]
        return luaconfig_windows::WindowsProcessManagerFactory::platform_name();
    }
}
