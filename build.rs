// 构建脚本: 链接FFmpeg依赖库 (采集模块使用静态FFmpeg)
fn main() {
    // 仅在Windows MSVC环境下添加FFmpeg相关库
    #[cfg(all(target_os = "windows", target_env = "msvc"))]
    {
        // Intel QSV (Quick Sync Video) 硬件解码
        println!("cargo:rustc-link-lib=dylib=libmfx");

        // 静态FFmpeg内置的x264
        println!("cargo:rustc-link-lib=dylib=libx264");

        // DirectShow 摄像头采集依赖 OLE 自动化和VFW
        println!("cargo:rustc-link-lib=dylib=oleaut32");
        println!("cargo:rustc-link-lib=dylib=vfw32");
        println!("cargo:rustc-link-lib=dylib=strmiids");

        // Secure Channel (网络摄像头 TLS)
        println!("cargo:rustc-link-lib=dylib=secur32");
    }
}
